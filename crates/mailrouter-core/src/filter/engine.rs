//! Filter evaluation.

use super::model::Filter;
use crate::envelope::Envelope;
use std::cmp::Ordering;
use std::net::IpAddr;

/// The message fields filters look at.
#[derive(Debug, Clone, Copy)]
pub struct MatchInput<'a> {
    /// Envelope sender.
    pub sender: &'a str,
    /// Envelope recipients.
    pub recipients: &'a [String],
    /// Decoded subject, empty when absent.
    pub subject: &'a str,
    /// Submitting peer.
    pub origin: IpAddr,
}

impl<'a> MatchInput<'a> {
    /// Borrows the envelope fields; `subject` comes from the parsed headers.
    #[must_use]
    pub fn from_envelope(envelope: &'a Envelope, subject: &'a str) -> Self {
        Self {
            sender: &envelope.sender,
            recipients: &envelope.recipients,
            subject,
            origin: envelope.origin(),
        }
    }
}

/// The first filter that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMatch {
    /// Name of the matching filter.
    pub filter_name: String,
    /// Route the filter points at.
    pub route_id: String,
}

fn evaluation_order(a: &Filter, b: &Filter) -> Ordering {
    a.order
        .cmp(&b.order)
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.name.cmp(&b.name))
}

/// Returns filters in evaluation order: `order`, then `id`, then `name`.
pub fn sorted_filters<'a>(filters: impl IntoIterator<Item = &'a Filter>) -> Vec<Filter> {
    let mut list: Vec<Filter> = filters.into_iter().cloned().collect();
    list.sort_by(evaluation_order);
    list
}

/// Evaluates filters in order and returns the first match.
///
/// `filters` need not be sorted.
pub fn evaluate<'a>(
    input: &MatchInput<'_>,
    filters: impl IntoIterator<Item = &'a Filter>,
) -> Option<FilterMatch> {
    let mut ordered: Vec<&Filter> = filters.into_iter().collect();
    ordered.sort_by(|a, b| evaluation_order(a, b));

    ordered
        .into_iter()
        .find(|filter| filter.matches(input))
        .map(|filter| FilterMatch {
            filter_name: filter.name.clone(),
            route_id: filter.route_id.clone(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filter(id: &str, order: i64, subject: &str, route: &str) -> Filter {
        Filter {
            id: id.into(),
            order,
            name: format!("filter-{id}"),
            subject: subject.into(),
            route_id: route.into(),
            ..Filter::default()
        }
    }

    fn input(subject: &str) -> MatchInput<'_> {
        MatchInput {
            sender: "a@example.com",
            recipients: &[],
            subject,
            origin: IpAddr::from([127, 0, 0, 1]),
        }
    }

    #[test]
    fn test_lowest_order_wins() {
        let filters = [
            filter("a", 20, "report", "late"),
            filter("b", 10, "report", "early"),
        ];
        let hit = evaluate(&input("weekly report"), &filters).unwrap();
        assert_eq!(hit.route_id, "early");
        assert_eq!(hit.filter_name, "filter-b");
    }

    #[test]
    fn test_tie_broken_by_id() {
        let filters = [
            filter("zz", 1, "x", "second"),
            filter("aa", 1, "x", "first"),
        ];
        assert_eq!(evaluate(&input("x"), &filters).unwrap().route_id, "first");
    }

    #[test]
    fn test_skips_non_matching_and_inert() {
        let filters = [
            filter("a", 1, "", "inert"),
            filter("b", 2, "nope", "miss"),
            filter("c", 3, "yes", "hit"),
        ];
        assert_eq!(evaluate(&input("yes please"), &filters).unwrap().route_id, "hit");
        assert!(evaluate(&input("nothing"), &filters).is_none());
    }

    #[test]
    fn test_no_filters() {
        assert!(evaluate(&input("x"), &Vec::<Filter>::new()).is_none());
    }

    #[test]
    fn test_sorted_filters() {
        let filters = [
            filter("b", 5, "", ""),
            filter("a", 5, "", ""),
            filter("c", -1, "", ""),
        ];
        let ids: Vec<String> = sorted_filters(&filters).into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    proptest! {
        #[test]
        fn prop_subject_filter_matches_iff_substring(
            needle in "[a-c]{1,3}",
            haystack in "[a-c ]{0,12}",
        ) {
            let filters = [filter("f", 0, &needle, "r")];
            let hit = evaluate(&input(&haystack), &filters);
            prop_assert_eq!(hit.is_some(), haystack.contains(&needle));
        }

        #[test]
        fn prop_result_is_first_matching_in_order(orders in proptest::collection::vec(-5i64..5, 1..8)) {
            let filters: Vec<Filter> = orders
                .iter()
                .enumerate()
                .map(|(i, order)| filter(&format!("{i:02}"), *order, "x", &format!("r{i:02}")))
                .collect();
            let expected = sorted_filters(&filters).remove(0).route_id;
            let hit = evaluate(&input("x"), &filters).unwrap();
            prop_assert_eq!(hit.route_id, expected);
        }
    }
}

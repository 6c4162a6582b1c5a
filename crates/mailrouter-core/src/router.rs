//! Per-message pipeline: parse, match, resolve, deliver, record.

use crate::activity::{ActivityLog, LABEL_DROP, LABEL_FAILED, LABEL_REJECTED, LogEntry};
use crate::config::ConfigStore;
use crate::dispatch::{Dispatcher, Transport};
use crate::envelope::Envelope;
use crate::filter::{Filter, MatchInput, evaluate};
use crate::outcome::{Outcome, OutcomeKind};
use crate::route::{Route, resolve};
use crate::stats::{Stats, StatsSnapshot};
use mailrouter_mime::Message;
use tracing::{info, warn};

/// Routes inbound messages and keeps the dashboard bookkeeping.
///
/// Share it between connection tasks behind an `Arc`.
#[derive(Debug)]
pub struct MailRouter<T> {
    config: ConfigStore,
    dispatcher: Dispatcher<T>,
    stats: Stats,
    activity: ActivityLog,
}

impl<T: Transport> MailRouter<T> {
    /// Creates a router reading routes and filters from `config`.
    #[must_use]
    pub fn new(config: ConfigStore, dispatcher: Dispatcher<T>) -> Self {
        Self {
            config,
            dispatcher,
            stats: Stats::new(),
            activity: ActivityLog::new(),
        }
    }

    /// Handles one accepted message end to end.
    ///
    /// Never fails: parse errors, unresolved routes and delivery errors all
    /// become outcomes, each counted and logged.
    pub async fn handle(&self, envelope: Envelope) -> Outcome {
        let size = envelope.size();
        let origin = envelope.origin();

        let (subject, message_id) = match Message::parse(&envelope.data) {
            Ok(message) => (
                message.subject(),
                message.message_id().map(str::to_string).unwrap_or_default(),
            ),
            Err(err) => {
                warn!(%origin, from = %envelope.sender, error = %err, "rejecting unparsable message");
                let outcome = Outcome::new(OutcomeKind::Rejected, size);
                self.record(
                    outcome,
                    LogEntry::now(
                        origin,
                        &envelope.sender,
                        &envelope.recipients,
                        "",
                        "",
                        LABEL_REJECTED,
                        outcome.kind,
                    )
                    .with_error(err.to_string()),
                );
                return outcome;
            }
        };

        let input = MatchInput::from_envelope(&envelope, &subject);
        let (matched, resolved) = self.config.read(|cfg| {
            let matched = evaluate(&input, cfg.filters.values());
            let route_id = matched.as_ref().map_or("", |hit| hit.route_id.as_str());
            let resolved = resolve(route_id, &cfg.routes);
            (matched, resolved)
        });
        let filter_name = matched.map(|hit| hit.filter_name).unwrap_or_default();

        let route = match resolved {
            Ok(route) => route,
            Err(err) => {
                warn!(from = %envelope.sender, filter = %filter_name, error = %err, "no usable route, dropping message");
                let outcome = Outcome::new(OutcomeKind::Dropped, size);
                self.record(
                    outcome,
                    LogEntry::now(
                        origin,
                        &envelope.sender,
                        &envelope.recipients,
                        subject,
                        filter_name,
                        LABEL_DROP,
                        outcome.kind,
                    )
                    .with_error(err.to_string()),
                );
                return outcome;
            }
        };

        let report = self.dispatcher.deliver(&envelope, &route).await;
        let label = match report.outcome.kind {
            OutcomeKind::Sent => route.name.as_str(),
            OutcomeKind::Dropped => LABEL_DROP,
            OutcomeKind::Failed => LABEL_FAILED,
            OutcomeKind::Rejected => LABEL_REJECTED,
        };

        info!(
            from = %envelope.sender,
            message_id = %message_id,
            filter = %filter_name,
            route = %route.name,
            outcome = %report.outcome.kind,
            size,
            "message processed"
        );

        let mut entry = LogEntry::now(
            origin,
            &envelope.sender,
            &report.recipients,
            subject,
            filter_name,
            label,
            report.outcome.kind,
        );
        entry.error = report.error;
        self.record(report.outcome, entry);
        report.outcome
    }

    fn record(&self, outcome: Outcome, entry: LogEntry) {
        self.stats.record(outcome);
        self.activity.add(entry);
    }
}

impl<T> MailRouter<T> {
    /// The configuration this router reads.
    #[must_use]
    pub const fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// The dispatcher messages are delivered through.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// Filters in evaluation order.
    #[must_use]
    pub fn sorted_filters(&self) -> Vec<Filter> {
        self.config.sorted_filters()
    }

    /// Routes in display order, DROP last.
    #[must_use]
    pub fn sorted_routes(&self) -> Vec<Route> {
        self.config.sorted_routes()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Recent activity, newest first.
    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        self.activity.entries()
    }
}

//! Filter engine.
//!
//! A filter pairs up to four match criteria with a destination route id.
//! Filters are evaluated in ascending `order` (ties broken by id, then
//! name); the first filter whose every set criterion holds decides the
//! route. A filter with no criteria set never matches.
//!
//! # Example
//!
//! ```ignore
//! use mailrouter_core::filter::{Filter, evaluate};
//!
//! let filter = Filter {
//!     id: "f1".into(),
//!     name: "Invoices".into(),
//!     subject: "Invoice".into(),
//!     route_id: "accounts".into(),
//!     ..Filter::default()
//! };
//!
//! if let Some(hit) = evaluate(&MatchInput::from_envelope(&envelope, &subject), &[filter]) {
//!     println!("{} -> {}", hit.filter_name, hit.route_id);
//! }
//! ```

mod engine;
mod model;
mod origin;

pub use engine::{FilterMatch, MatchInput, evaluate, sorted_filters};
pub use model::Filter;
pub use origin::{OriginPattern, origin_matches};

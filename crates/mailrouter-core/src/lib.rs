//! # mailrouter-core
//!
//! Routing logic for mailrouter.
//!
//! This crate provides:
//! - **Filters** - ordered match rules over sender, recipients, subject and
//!   origin address
//! - **Routes** - outbound destinations, the default route and the DROP route
//! - **Config store** - the shared, lock-protected routes and filters, with
//!   JSON load/save and admin mutations
//! - **Dispatcher** - one bounded SMTP submission per message
//! - **Stats and activity log** - counters and the last 20 messages
//! - **Router** - the per-message pipeline tying these together

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod activity;
pub mod config;
pub mod dispatch;
mod envelope;
mod error;
pub mod filter;
mod outcome;
pub mod route;
mod router;
pub mod stats;

pub use activity::{ActivityLog, LogEntry, MAX_LOG_ENTRIES};
pub use config::{Config, ConfigStore};
pub use dispatch::{
    DEFAULT_DELIVERY_TIMEOUT, DeliveryReport, Dispatcher, SmtpTransport, Submission, Transport,
};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use filter::{Filter, FilterMatch};
pub use outcome::{Outcome, OutcomeKind};
pub use route::{AuthMode, DROP_ROUTE_ID, Route};
pub use router::MailRouter;
pub use stats::{Stats, StatsSnapshot};

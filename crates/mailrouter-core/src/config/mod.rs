//! Routing configuration and its shared store.
//!
//! The on-disk format is JSON with three top-level maps:
//!
//! ```json
//! {
//!   "Routes":  { "<id>": { "Id": "...", "Name": "...", "Hostname": "...", "Port": 25, ... } },
//!   "Filters": { "<id>": { "Id": "...", "Order": 10, "Subject": "...", "RouteId": "...", ... } },
//!   "Options": { "PIDFile": "/run/mailrouter.pid" }
//! }
//! ```

mod model;
mod store;

pub use model::{Config, PID_FILE_OPTION};
pub use store::ConfigStore;

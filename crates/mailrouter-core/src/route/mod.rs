//! Route table.
//!
//! Routes are outbound SMTP destinations. The reserved `DROP` route
//! discards mail; it is always present in memory and never written to the
//! configuration file.

mod model;
mod table;

pub use model::{AuthMode, DROP_ROUTE_ID, DROP_ROUTE_NAME, Route};
pub use table::{default_route, resolve, sorted_routes};

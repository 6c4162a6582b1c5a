//! Configuration document.

use crate::filter::Filter;
use crate::route::{DROP_ROUTE_ID, Route};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Option key naming the PID file path.
pub const PID_FILE_OPTION: &str = "PIDFile";

/// Routes, filters and free-form options, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Config {
    /// Outbound destinations.
    pub routes: HashMap<String, Route>,
    /// Match rules.
    pub filters: HashMap<String, Filter>,
    /// String options (`PIDFile`).
    pub options: HashMap<String, String>,
}

impl Config {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Pretty JSON without the built-in DROP route.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut persisted = self.clone();
        persisted.routes.remove(DROP_ROUTE_ID);
        serde_json::to_string_pretty(&persisted)
    }

    /// Adds the DROP route, as default when no other route is.
    ///
    /// Also fills in missing option keys.
    pub fn ensure_drop_route(&mut self) {
        let other_default = self
            .routes
            .values()
            .any(|route| !route.is_drop() && route.is_default);
        self.routes
            .insert(DROP_ROUTE_ID.to_string(), Route::drop_route(!other_default));
        self.options
            .entry(PID_FILE_OPTION.to_string())
            .or_default();
    }

    /// Number of routes, not counting DROP.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.values().filter(|route| !route.is_drop()).count()
    }

    /// Configured PID file path, if any.
    #[must_use]
    pub fn pid_file(&self) -> Option<&str> {
        self.options
            .get(PID_FILE_OPTION)
            .map(String::as_str)
            .filter(|path| !path.is_empty())
    }
}

//! Shared, lock-protected configuration.

use super::model::Config;
use crate::error::{Error, Result};
use crate::filter::{Filter, sorted_filters};
use crate::route::{DROP_ROUTE_ID, Route, sorted_routes};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Current routes and filters behind a reader/writer lock.
///
/// Cloning is cheap and yields a handle to the same configuration. The DROP
/// route is always present, and it is the default whenever no other route
/// is.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    inner: Arc<RwLock<Config>>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl ConfigStore {
    /// Wraps a configuration, adding the DROP route.
    #[must_use]
    pub fn new(mut config: Config) -> Self {
        config.ensure_drop_route();
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Generates an id for a new route or filter.
    #[must_use]
    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Config> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Config> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the configuration with the contents of `path`.
    ///
    /// Returns the number of routes (excluding DROP) and filters loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed. The store is
    /// then left holding only the DROP route, as default.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<(usize, usize)> {
        let path = path.as_ref();
        let parsed = std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|text| Ok(Config::from_json(&text)?));

        let (mut config, outcome) = match parsed {
            Ok(config) => (config, Ok(())),
            Err(err) => (Config::default(), Err(err)),
        };
        config.ensure_drop_route();
        let counts = (config.route_count(), config.filters.len());
        *self.write_guard() = config;

        outcome?;
        info!(path = %path.display(), routes = counts.0, filters = counts.1, "configuration loaded");
        Ok(counts)
    }

    /// Writes the configuration to `path` as pretty JSON, without DROP.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.read_guard().to_json()?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Runs `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&Config) -> R) -> R {
        f(&self.read_guard())
    }

    /// Owned copy of the whole configuration.
    #[must_use]
    pub fn snapshot(&self) -> Config {
        self.read_guard().clone()
    }

    /// Filters in evaluation order.
    #[must_use]
    pub fn sorted_filters(&self) -> Vec<Filter> {
        sorted_filters(self.read_guard().filters.values())
    }

    /// Routes in display order, DROP last.
    #[must_use]
    pub fn sorted_routes(&self) -> Vec<Route> {
        sorted_routes(self.read_guard().routes.values())
    }

    /// Configured PID file path, if any.
    #[must_use]
    pub fn pid_file(&self) -> Option<String> {
        self.read_guard().pid_file().map(str::to_string)
    }

    /// Adds or replaces a route.
    ///
    /// A route saved as default takes the flag from every other route. If
    /// no route is left flagged, DROP becomes the default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRoute`] if the route fails validation.
    pub fn upsert_route(&self, route: Route) -> Result<()> {
        route.validate()?;
        let mut config = self.write_guard();
        if route.is_default {
            for other in config.routes.values_mut() {
                other.is_default = false;
            }
        }
        info!(id = %route.id, name = %route.name, host = %route.hostname, "route saved");
        config.routes.insert(route.id.clone(), route);
        promote_drop_if_no_default(&mut config);
        Ok(())
    }

    /// Makes `id` the only default route.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RouteNotFound`] if there is no such route.
    pub fn set_default_route(&self, id: &str) -> Result<()> {
        let mut config = self.write_guard();
        if !config.routes.contains_key(id) {
            return Err(Error::RouteNotFound(id.to_string()));
        }
        for route in config.routes.values_mut() {
            route.is_default = route.id == id;
        }
        info!(id, "default route changed");
        Ok(())
    }

    /// Removes a route and returns it. Deleting the default makes DROP the
    /// default. Filters pointing at the route are left as they are.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRoute`] for DROP and [`Error::RouteNotFound`]
    /// for an unknown id.
    pub fn delete_route(&self, id: &str) -> Result<Route> {
        if id == DROP_ROUTE_ID {
            return Err(Error::InvalidRoute(
                "the DROP route cannot be deleted".to_string(),
            ));
        }
        let mut config = self.write_guard();
        let removed = config
            .routes
            .remove(id)
            .ok_or_else(|| Error::RouteNotFound(id.to_string()))?;
        promote_drop_if_no_default(&mut config);
        info!(id, name = %removed.name, "route deleted");
        Ok(removed)
    }

    /// Adds or replaces a filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilter`] for an empty id or a `route_id` that
    /// is not in the route table.
    pub fn upsert_filter(&self, filter: Filter) -> Result<()> {
        if filter.id.is_empty() {
            return Err(Error::InvalidFilter("id is required".to_string()));
        }
        let mut config = self.write_guard();
        if !config.routes.contains_key(&filter.route_id) {
            return Err(Error::InvalidFilter(format!(
                "{}: unknown route {:?}",
                filter.id, filter.route_id
            )));
        }
        info!(id = %filter.id, name = %filter.name, criteria = %filter.summary(), "filter saved");
        config.filters.insert(filter.id.clone(), filter);
        Ok(())
    }

    /// Removes a filter and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FilterNotFound`] for an unknown id.
    pub fn delete_filter(&self, id: &str) -> Result<Filter> {
        let removed = self
            .write_guard()
            .filters
            .remove(id)
            .ok_or_else(|| Error::FilterNotFound(id.to_string()))?;
        info!(id, name = %removed.name, "filter deleted");
        Ok(removed)
    }
}

fn promote_drop_if_no_default(config: &mut Config) {
    if config.routes.values().any(|route| route.is_default) {
        return;
    }
    if let Some(drop) = config.routes.get_mut(DROP_ROUTE_ID) {
        drop.is_default = true;
        info!("DROP is now the default route");
    }
}

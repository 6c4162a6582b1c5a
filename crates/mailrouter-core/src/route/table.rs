//! Destination resolution.

use super::model::Route;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// The default-flagged route; with several flagged, the lowest id wins.
#[must_use]
pub fn default_route(routes: &HashMap<String, Route>) -> Option<&Route> {
    routes
        .values()
        .filter(|route| route.is_default)
        .min_by(|a, b| a.id.cmp(&b.id))
}

/// Resolves a destination id to a route.
///
/// An empty id means "no filter matched" and selects the default route.
///
/// # Errors
///
/// [`Error::RouteNotFound`] for an unknown id, [`Error::NoDefaultRoute`]
/// when `destination_id` is empty and no route is flagged default.
pub fn resolve(destination_id: &str, routes: &HashMap<String, Route>) -> Result<Route> {
    if destination_id.is_empty() {
        return default_route(routes)
            .cloned()
            .ok_or(Error::NoDefaultRoute);
    }

    routes
        .get(destination_id)
        .cloned()
        .ok_or_else(|| Error::RouteNotFound(destination_id.to_string()))
}

/// Routes for display: by name, then id, with DROP always last.
pub fn sorted_routes<'a>(routes: impl IntoIterator<Item = &'a Route>) -> Vec<Route> {
    let mut list: Vec<Route> = routes.into_iter().cloned().collect();
    list.sort_by(|a, b| {
        a.is_drop()
            .cmp(&b.is_drop())
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    list
}

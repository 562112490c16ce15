//! Path-prefix route table.
//!
//! Routes are validated once when the table is built and never change while
//! the proxy runs. Resolution scans prefixes longest first, so `/extensions/a`
//! wins over `/extensions` when both are registered.

use std::collections::HashSet;

use thiserror::Error;

/// One routable upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Label of the target, used in logs.
    pub label: String,
    /// Requests whose path starts with this prefix go here; `None` is the
    /// catch-all.
    pub path_prefix: Option<String>,
    /// Local port the upstream listens on.
    pub port: u16,
}

impl Route {
    pub fn prefixed(label: impl Into<String>, prefix: impl Into<String>, port: u16) -> Self {
        Self {
            label: label.into(),
            path_prefix: Some(prefix.into()),
            port,
        }
    }

    pub fn catch_all(label: impl Into<String>, port: u16) -> Self {
        Self {
            label: label.into(),
            path_prefix: None,
            port,
        }
    }
}

/// Invalid route configuration, detected before anything listens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("Path prefix {prefix:?} of {label} must start with '/'")]
    InvalidPrefix { label: String, prefix: String },

    #[error("Path prefix {prefix} is used by both {first} and {second}")]
    DuplicatePrefix {
        prefix: String,
        first: String,
        second: String,
    },

    #[error("Only one target may omit a path prefix, found {first} and {second}")]
    MultipleCatchAll { first: String, second: String },

    #[error("Port {port} is assigned to both {first} and {second}")]
    DuplicatePort {
        port: u16,
        first: String,
        second: String,
    },

    #[error("Port 0 is not a valid upstream port for {label}")]
    InvalidPort { label: String },
}

/// Immutable set of routes.
#[derive(Debug, Clone)]
pub struct RouteTable {
    /// Prefixed routes, longest prefix first.
    prefixed: Vec<Route>,
    catch_all: Option<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Result<Self, RoutingError> {
        let mut prefixed: Vec<Route> = Vec::new();
        let mut catch_all: Option<Route> = None;
        let mut ports: Vec<(u16, String)> = Vec::new();
        let mut seen_prefixes: HashSet<String> = HashSet::new();

        for route in routes {
            if route.port == 0 {
                return Err(RoutingError::InvalidPort { label: route.label });
            }
            if let Some((_, first)) = ports.iter().find(|(port, _)| *port == route.port) {
                return Err(RoutingError::DuplicatePort {
                    port: route.port,
                    first: first.clone(),
                    second: route.label,
                });
            }
            ports.push((route.port, route.label.clone()));

            match &route.path_prefix {
                None => {
                    if let Some(existing) = &catch_all {
                        return Err(RoutingError::MultipleCatchAll {
                            first: existing.label.clone(),
                            second: route.label,
                        });
                    }
                    catch_all = Some(route);
                }
                Some(prefix) => {
                    if !prefix.starts_with('/') {
                        return Err(RoutingError::InvalidPrefix {
                            label: route.label.clone(),
                            prefix: prefix.clone(),
                        });
                    }
                    if !seen_prefixes.insert(prefix.clone()) {
                        let first = prefixed
                            .iter()
                            .find(|r| r.path_prefix.as_deref() == Some(prefix))
                            .map(|r| r.label.clone())
                            .unwrap_or_default();
                        return Err(RoutingError::DuplicatePrefix {
                            prefix: prefix.clone(),
                            first,
                            second: route.label,
                        });
                    }
                    prefixed.push(route);
                }
            }
        }

        prefixed.sort_by_key(|route| {
            std::cmp::Reverse(route.path_prefix.as_deref().map_or(0, str::len))
        });

        Ok(Self {
            prefixed,
            catch_all,
        })
    }

    /// Route for a request path, if any.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.prefixed
            .iter()
            .find(|route| {
                route
                    .path_prefix
                    .as_deref()
                    .is_some_and(|prefix| path.starts_with(prefix))
            })
            .or(self.catch_all.as_ref())
    }

    pub const fn has_catch_all(&self) -> bool {
        self.catch_all.is_some()
    }

    pub fn len(&self) -> usize {
        self.prefixed.len() + usize::from(self.catch_all.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All routes, longest prefix first and the catch-all last.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.prefixed.iter().chain(self.catch_all.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new(vec![
            Route::catch_all("frontend", 5000),
            Route::prefixed("extensions", "/extensions", 4000),
            Route::prefixed("console", "/extensions/dev-console", 4100),
        ])
        .unwrap()
    }

    #[test]
    fn longest_prefix_wins() {
        let table = table();
        assert_eq!(table.resolve("/extensions/dev-console").unwrap().port, 4100);
        assert_eq!(table.resolve("/extensions/dev-console/app.js").unwrap().port, 4100);
        assert_eq!(table.resolve("/extensions/abc/assets").unwrap().port, 4000);
        assert_eq!(table.resolve("/extensions").unwrap().port, 4000);
    }

    #[test]
    fn unmatched_paths_use_catch_all() {
        let table = table();
        assert_eq!(table.resolve("/").unwrap().port, 5000);
        assert_eq!(table.resolve("/api/products").unwrap().port, 5000);
    }

    #[test]
    fn unmatched_paths_without_catch_all_resolve_to_none() {
        let table = RouteTable::new(vec![Route::prefixed("extensions", "/extensions", 4000)]).unwrap();
        assert!(table.resolve("/").is_none());
        assert!(table.resolve("/extension").is_none());
        assert!(!table.has_catch_all());
    }

    #[test]
    fn prefix_match_is_plain_string_prefix() {
        let table = RouteTable::new(vec![Route::prefixed("extensions", "/extensions", 4000)]).unwrap();
        assert_eq!(table.resolve("/extensionsfoo").unwrap().port, 4000);
    }

    #[test]
    fn rejects_duplicate_prefixes() {
        let err = RouteTable::new(vec![
            Route::prefixed("a", "/ext", 4000),
            Route::prefixed("b", "/ext", 4001),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            RoutingError::DuplicatePrefix {
                prefix: "/ext".to_string(),
                first: "a".to_string(),
                second: "b".to_string(),
            }
        );
    }

    #[test]
    fn rejects_second_catch_all() {
        let err = RouteTable::new(vec![
            Route::catch_all("frontend", 5000),
            Route::catch_all("other", 5001),
        ])
        .unwrap_err();
        assert!(matches!(err, RoutingError::MultipleCatchAll { .. }));
    }

    #[test]
    fn rejects_relative_and_empty_prefixes() {
        for prefix in ["extensions", ""] {
            let err = RouteTable::new(vec![Route::prefixed("a", prefix, 4000)]).unwrap_err();
            assert!(matches!(err, RoutingError::InvalidPrefix { .. }));
        }
    }

    #[test]
    fn rejects_shared_ports() {
        let err = RouteTable::new(vec![
            Route::prefixed("extensions", "/extensions", 4000),
            Route::catch_all("frontend", 4000),
        ])
        .unwrap_err();
        assert!(matches!(err, RoutingError::DuplicatePort { port: 4000, .. }));
    }

    #[test]
    fn routes_are_ordered_longest_first() {
        let table = table();
        let labels: Vec<_> = table.routes().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["console", "extensions", "frontend"]);
    }
}

//! # Radix Router
//!
//! Per-method radix trees mapping request paths to ordered handler chains.
//!
//! ## Features
//!
//! - Static segments with prefix compression (`/api/v1/users`)
//! - Named parameters (`/users/:id`)
//! - Validated parameters (`/users/:id|int`, `/x/:n|^\d+$`, `/c/:code|len:3`)
//! - Wildcard suffixes (`/files/*path`, `/assets/*`, `/docs/*rest|alpha`)
//! - Per-route metadata (`/admin role:admin`) reported alongside parameters
//!
//! ## Match priority
//!
//! literal > validated parameter > parameter > validated wildcard > wildcard.
//! Within one kind the route registered first wins.
//!
//! Registration borrows the router mutably, lookups share it; build the
//! router completely before serving from it.

use crate::error::{Error, Result};
use crate::params::ParamSink;
use crate::predicate::{resolve_checker, Checker};
use crate::route::{RoutePattern, Segment};
use crate::tree::Node;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, warn};

/// Registration method that expands to every supported method
pub const ANY: &str = "ANY";

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// Every supported method, in registration order for `ANY`
    pub const ALL: [Self; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Delete,
        Self::Head,
        Self::Patch,
        Self::Options,
    ];

    /// Canonical upper-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a method name the router does not support
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedMethod(pub String);

impl std::fmt::Display for UnsupportedMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unsupported HTTP method: {}", self.0)
    }
}

impl std::error::Error for UnsupportedMethod {}

impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnsupportedMethod(s.to_string()))
    }
}

/// Radix-tree router over opaque handler chains
///
/// `H` is whatever the caller dispatches on: boxed closures, handler ids,
/// enum variants. The router only stores and returns chains of them.
pub struct Router<H> {
    method_trees: HashMap<Method, Node<H>>,
    not_found: Vec<H>,
    method_not_allowed: Vec<H>,
    /// Whether `|check` segments are accepted
    validation: bool,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Router<H> {
    /// Create the full router, accepting validated segments
    #[must_use]
    pub fn new() -> Self {
        Self {
            method_trees: HashMap::new(),
            not_found: Vec::new(),
            method_not_allowed: Vec::new(),
            validation: true,
        }
    }

    /// Create the basic radix router: same tree and match order, but
    /// `:name|check` and `*name|check` segments are refused at registration
    #[must_use]
    pub fn basic() -> Self {
        Self {
            validation: false,
            ..Self::new()
        }
    }

    /// Whether this router accepts validated segments
    #[must_use]
    pub const fn supports_validation(&self) -> bool {
        self.validation
    }

    /// Replace the chain returned for unmatched paths (`"404"`) or for
    /// disallowed methods (`"405"`)
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSpecialHandler` for any other key.
    pub fn set_special(&mut self, key: &str, handler: H) -> Result<()> {
        match key {
            "404" => self.set_not_found(handler),
            "405" => self.set_method_not_allowed(handler),
            _ => {
                return Err(Error::UnknownSpecialHandler {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Replace the chain returned when no route matches
    pub fn set_not_found(&mut self, handler: H) {
        self.not_found = vec![handler];
    }

    /// Replace the chain returned for unsupported methods and for paths
    /// routed only under other methods
    pub fn set_method_not_allowed(&mut self, handler: H) {
        self.method_not_allowed = vec![handler];
    }

    /// Match a request, writing parameters into `params`
    ///
    /// Returns the matched chain. On a miss, returns the `405` chain when the
    /// method is unsupported or the path matches under another method, and
    /// the `404` chain otherwise. `params` is only written on a match.
    pub fn lookup<P>(&self, method: &str, path: &str, params: &mut P) -> &[H]
    where
        P: ParamSink + ?Sized,
    {
        let Ok(method) = method.parse::<Method>() else {
            return &self.method_not_allowed;
        };
        if let Some(handlers) = self.find(method, path, params) {
            return handlers;
        }
        if self.allowed_elsewhere(method, path) {
            &self.method_not_allowed
        } else {
            &self.not_found
        }
    }

    /// Whether `path` matches a route registered under a method other than
    /// `method`
    fn allowed_elsewhere(&self, method: Method, path: &str) -> bool {
        self.method_trees
            .iter()
            .filter(|(m, _)| **m != method)
            .any(|(_, root)| root.find(path, &mut Discard).is_some())
    }

    /// Match a request on a known method, returning `None` on a miss
    pub fn find<P>(&self, method: Method, path: &str, params: &mut P) -> Option<&[H]>
    where
        P: ParamSink + ?Sized,
    {
        self.method_trees.get(&method)?.find(path, params)
    }

    /// Whether any route was registered for `method`
    #[must_use]
    pub fn has_method(&self, method: Method) -> bool {
        self.method_trees.contains_key(&method)
    }
}

impl<H: Clone> Router<H> {
    /// Attach a handler chain to `(method, pattern)`
    ///
    /// `method` is matched case-insensitively here, unlike at lookup where
    /// method tokens must be exact; `"ANY"` registers on every
    /// supported method. An unsupported method is discarded with a warning.
    /// Registering the same pattern again replaces its chain in place.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` for a malformed pattern (or a
    /// validated segment on a basic router), `Error::UnknownPredicate` or
    /// `Error::PredicateRejected` if a check cannot be resolved. Nothing is
    /// inserted when an error is returned.
    pub fn register(&mut self, method: &str, pattern: &str, handlers: Vec<H>) -> Result<()> {
        let route = RoutePattern::parse(pattern)?;
        if !self.validation && route.has_validation() {
            return Err(Error::pattern(
                pattern,
                "validated segments need a router built with Router::new",
            ));
        }
        let checks = resolve_checks(&route)?;

        let methods: Vec<Method> = if method.eq_ignore_ascii_case(ANY) {
            Method::ALL.to_vec()
        } else {
            match method.to_ascii_uppercase().parse::<Method>() {
                Ok(m) => vec![m],
                Err(e) => {
                    warn!(pattern = %route.path, "Discarding route: {e}");
                    return Ok(());
                }
            }
        };

        for m in methods {
            self.method_trees
                .entry(m)
                .or_insert_with(Node::root)
                .insert(&route, &checks, handlers.clone());
            debug!(method = %m, route = %route.path, handlers = handlers.len(), "Route registered");
        }
        Ok(())
    }

    /// Register a GET route
    pub fn get(&mut self, pattern: &str, handlers: Vec<H>) -> Result<()> {
        self.register("GET", pattern, handlers)
    }

    /// Register a POST route
    pub fn post(&mut self, pattern: &str, handlers: Vec<H>) -> Result<()> {
        self.register("POST", pattern, handlers)
    }

    /// Register a PUT route
    pub fn put(&mut self, pattern: &str, handlers: Vec<H>) -> Result<()> {
        self.register("PUT", pattern, handlers)
    }

    /// Register a DELETE route
    pub fn delete(&mut self, pattern: &str, handlers: Vec<H>) -> Result<()> {
        self.register("DELETE", pattern, handlers)
    }

    /// Register a route on every supported method
    pub fn any(&mut self, pattern: &str, handlers: Vec<H>) -> Result<()> {
        self.register(ANY, pattern, handlers)
    }
}

impl<H> std::fmt::Debug for Router<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("methods", &self.method_trees.keys().collect::<Vec<_>>())
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

/// Sink that drops every parameter
struct Discard;

impl ParamSink for Discard {
    fn add_param(&mut self, _name: &str, _value: &str) {}
}

fn resolve_checks(route: &RoutePattern) -> Result<Vec<Option<Checker>>> {
    route
        .segments
        .iter()
        .map(|segment| match segment {
            Segment::Param {
                check: Some(check), ..
            }
            | Segment::Wildcard {
                check: Some(check), ..
            } => resolve_checker(check).map(Some),
            _ => Ok(None),
        })
        .collect()
}

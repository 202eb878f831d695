//! # Path Parameters
//!
//! The router never owns parameter storage. It writes `(name, value)` pairs
//! into a caller-supplied [`ParamSink`] in match order: route tags first (at
//! the leaf), then path parameters from the deepest segment outwards.
//!
//! [`Params`] is the ordered collector the server uses, with typed accessors
//! for the common conversions.

use std::collections::HashMap;

/// Tag under which the matched route pattern is reported
pub const ROUTE_TAG: &str = "route";

/// Receiver for parameters emitted during a match
pub trait ParamSink {
    /// Append one parameter. Order of calls is significant.
    fn add_param(&mut self, name: &str, value: &str);
}

impl ParamSink for Vec<(String, String)> {
    fn add_param(&mut self, name: &str, value: &str) {
        self.push((name.to_string(), value.to_string()));
    }
}

/// Map-backed sink. A name emitted twice keeps the first value, so a path
/// parameter can never shadow the `route` tag emitted before it.
impl ParamSink for HashMap<String, String> {
    fn add_param(&mut self, name: &str, value: &str) {
        self.entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }
}

/// Ordered parameter collector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// First value recorded under `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The pattern of the matched route, if any
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.get(ROUTE_TAG)
    }

    /// Get a parameter as i64
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.parse().ok())
    }

    /// Get a parameter as f64
    #[must_use]
    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.parse().ok())
    }

    /// Get a parameter as bool (`true/false`, `1/0`, `yes/no`)
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(parse_bool)
    }

    /// Iterate pairs in emission order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of recorded pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check if nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Drop all pairs, keeping the allocation
    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}

impl ParamSink for Params {
    fn add_param(&mut self, name: &str, value: &str) {
        self.pairs.push((name.to_string(), value.to_string()));
    }
}

/// Lenient boolean parsing shared with the `bool` route predicate
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

//! # Error Handling
//!
//! Centralized error types for Tessera core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Route mismatches and cache expirations are not errors: they are expressed
//! through the returned handler chain or an absent value.

use thiserror::Error;

/// Result type alias for Tessera operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Tessera runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Invalid route pattern provided at registration
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// A validated segment names a predicate that is not registered
    #[error("Unknown route predicate: {name}")]
    UnknownPredicate {
        /// Predicate name as spelled in the pattern
        name: String,
    },

    /// A predicate factory refused its argument
    #[error("Route predicate {spelling} rejected: {reason}")]
    PredicateRejected {
        /// Full `name:arg` spelling
        spelling: String,
        /// Why the factory produced no predicate
        reason: String,
    },

    /// `set_special` called with a key other than `404` or `405`
    #[error("Unknown special handler key: {key}")]
    UnknownSpecialHandler {
        /// The rejected key
        key: String,
    },

    /// No cache in a group is configured for the key
    #[error("No cache configured for key: {key}")]
    NoCacheForKey {
        /// The key that could not be routed
        key: String,
    },

    /// A cache backend refused a write
    #[error("Cache set failed for {key}: {reason}")]
    CacheSet {
        /// The key being written
        key: String,
        /// Backend-specific reason
        reason: String,
    },

    /// Configuration is structurally valid but semantically wrong
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidRoutePattern`]
    pub(crate) fn pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRoutePattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error was raised while registering a route
    #[must_use]
    pub const fn is_registration(&self) -> bool {
        matches!(
            self,
            Self::InvalidRoutePattern { .. }
                | Self::UnknownPredicate { .. }
                | Self::PredicateRejected { .. }
                | Self::UnknownSpecialHandler { .. }
        )
    }
}

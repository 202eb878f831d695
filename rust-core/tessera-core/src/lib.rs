//! # Tessera Core
//!
//! Core runtime library for the Tessera web framework.
//! Provides the radix router, an expiring in-memory cache and the HTTP
//! server that drives handler chains.
//!
//! ## Modules
//!
//! - `router` - Per-method radix trees with validated segments
//! - `route` - Route pattern parsing (segments, checks, metadata tags)
//! - `predicate` - Process-wide registry of segment validators
//! - `params` - Parameter sinks and the ordered `Params` collector
//! - `cache` - Lock-free-read memory cache with per-entry TTL
//! - `cache_group` - Prefix-routed set of caches
//! - `server` - HTTP server built on Hyper
//! - `request` - HTTP request wrapper with headers and query parsing
//! - `config` - TOML configuration
//! - `logging` - Tracing subscriber setup
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod cache_group;
pub mod config;
pub mod error;
pub mod logging;
pub mod params;
pub mod path;
pub mod predicate;
pub mod request;
pub mod route;
pub mod router;
pub mod server;
pub(crate) mod tree;

pub use cache::{Cache, MemoryCache};
pub use cache_group::{CacheGroup, PrefixMatch};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use params::{ParamSink, Params};
pub use request::Request;
pub use router::{Method, Router};
pub use server::{Context, Handler, Response, Server};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

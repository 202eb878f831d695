//! # Route Predicates
//!
//! Process-wide registry of named segment validators used by `:name|check`
//! and `*name|check` route segments.
//!
//! Two tables back the registry:
//!
//! - fixed predicates, looked up by exact name (`int`, `uuid`, ...)
//! - factories, invoked as `name:arg` (`regexp:^[a-z]+$`, `len:4`, ...)
//!
//! A factory result is memoized in the fixed table under its full spelling so
//! repeated registrations of the same check share one predicate. A check that
//! starts with `^` is shorthand for `regexp:<check>`.
//!
//! Registration happens at startup; matching only ever clones an `Arc` out of
//! an already-resolved node, so the registry lock is off the request path.

use crate::error::{Error, Result};
use crate::params::parse_bool;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Segment validator
pub type Checker = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Builds a [`Checker`] from the argument after `name:`
pub type CheckerFactory =
    Arc<dyn Fn(&str) -> std::result::Result<Checker, String> + Send + Sync>;

struct Registry {
    checkers: HashMap<String, Checker>,
    factories: HashMap<String, CheckerFactory>,
}

static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();

fn registry() -> &'static RwLock<Registry> {
    REGISTRY.get_or_init(|| RwLock::new(Registry::with_builtins()))
}

/// Register (or replace) a fixed predicate
pub fn register_checker<F>(name: impl Into<String>, check: F)
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    registry().write().checkers.insert(name.into(), Arc::new(check));
}

/// Register (or replace) a parameterized predicate factory
pub fn register_checker_factory<F>(name: impl Into<String>, factory: F)
where
    F: Fn(&str) -> std::result::Result<Checker, String> + Send + Sync + 'static,
{
    registry()
        .write()
        .factories
        .insert(name.into(), Arc::new(factory));
}

/// Resolve a check spelling into a predicate
///
/// # Errors
///
/// Returns `Error::UnknownPredicate` if neither table knows the name, and
/// `Error::PredicateRejected` if a factory refuses its argument.
pub fn resolve_checker(spelling: &str) -> Result<Checker> {
    let spelling = if spelling.starts_with('^') {
        format!("regexp:{spelling}")
    } else {
        spelling.to_string()
    };

    if let Some(check) = registry().read().checkers.get(&spelling) {
        return Ok(Arc::clone(check));
    }

    let Some((name, arg)) = spelling.split_once(':') else {
        return Err(Error::UnknownPredicate { name: spelling });
    };

    let factory = registry()
        .read()
        .factories
        .get(name)
        .cloned()
        .ok_or_else(|| Error::UnknownPredicate {
            name: name.to_string(),
        })?;

    // Invoked outside the lock: a factory may itself consult the registry.
    let check = factory(arg).map_err(|reason| Error::PredicateRejected {
        spelling: spelling.clone(),
        reason,
    })?;

    debug!(spelling = %spelling, "Memoized route predicate");
    let memoized = Arc::clone(
        registry()
            .write()
            .checkers
            .entry(spelling)
            .or_insert(check),
    );
    Ok(memoized)
}

impl Registry {
    fn with_builtins() -> Self {
        let mut checkers: HashMap<String, Checker> = HashMap::new();
        checkers.insert("int".into(), Arc::new(|s: &str| s.parse::<i64>().is_ok()));
        checkers.insert("uint".into(), Arc::new(|s: &str| s.parse::<u64>().is_ok()));
        checkers.insert(
            "float".into(),
            Arc::new(|s: &str| s.parse::<f64>().is_ok_and(f64::is_finite)),
        );
        checkers.insert("bool".into(), Arc::new(|s: &str| parse_bool(s).is_some()));
        checkers.insert(
            "alpha".into(),
            Arc::new(|s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphabetic())),
        );
        checkers.insert(
            "alnum".into(),
            Arc::new(|s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())),
        );
        checkers.insert(
            "hex".into(),
            Arc::new(|s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())),
        );
        checkers.insert("uuid".into(), Arc::new(is_uuid));

        let mut factories: HashMap<String, CheckerFactory> = HashMap::new();
        factories.insert("regexp".into(), Arc::new(regexp_factory));
        factories.insert("len".into(), Arc::new(len_factory));
        factories.insert("min".into(), Arc::new(min_factory));
        factories.insert("max".into(), Arc::new(max_factory));
        factories.insert("oneof".into(), Arc::new(oneof_factory));

        Self { checkers, factories }
    }
}

fn regexp_factory(arg: &str) -> std::result::Result<Checker, String> {
    let re = Regex::new(arg).map_err(|e| e.to_string())?;
    Ok(Arc::new(move |s: &str| re.is_match(s)))
}

fn len_factory(arg: &str) -> std::result::Result<Checker, String> {
    let n: usize = arg.parse().map_err(|_| format!("'{arg}' is not a length"))?;
    Ok(Arc::new(move |s: &str| s.chars().count() == n))
}

fn min_factory(arg: &str) -> std::result::Result<Checker, String> {
    let min: i64 = arg.parse().map_err(|_| format!("'{arg}' is not an integer"))?;
    Ok(Arc::new(move |s: &str| s.parse::<i64>().is_ok_and(|v| v >= min)))
}

fn max_factory(arg: &str) -> std::result::Result<Checker, String> {
    let max: i64 = arg.parse().map_err(|_| format!("'{arg}' is not an integer"))?;
    Ok(Arc::new(move |s: &str| s.parse::<i64>().is_ok_and(|v| v <= max)))
}

fn oneof_factory(arg: &str) -> std::result::Result<Checker, String> {
    let choices: Vec<String> = arg
        .split(',')
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect();
    if choices.is_empty() {
        return Err("oneof needs at least one choice".to_string());
    }
    Ok(Arc::new(move |s: &str| choices.iter().any(|c| c == s)))
}

fn is_uuid(s: &str) -> bool {
    s.len() == 36
        && s.bytes().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

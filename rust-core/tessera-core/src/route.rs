//! # Route Patterns
//!
//! Parses a registration pattern into tree segments and route metadata.
//!
//! ```text
//! /api/v1/users/:id/files/*path   role:admin version:v1
//! ```
//!
//! The first whitespace-separated token is the path, reported on match under
//! the `route` tag. Every further token must be `key:value` and becomes an
//! additional tag emitted alongside it.

use crate::error::{Error, Result};
use crate::params::ROUTE_TAG;
use crate::path::split_path;

/// One parsed path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal run, matched byte for byte
    Literal(String),
    /// `:name` or `:name|check`
    Param {
        /// Token as written, used to deduplicate siblings
        spelling: String,
        /// Name the value is reported under
        name: String,
        /// Predicate spelling after `|`
        check: Option<String>,
    },
    /// `*`, `*name` or `*name|check`
    Wildcard {
        /// Token as written
        spelling: String,
        /// Name the tail is reported under (`*` when unnamed)
        name: String,
        /// Predicate spelling after `|`
        check: Option<String>,
    },
}

impl Segment {
    /// Whether the segment carries a validation predicate
    #[must_use]
    pub const fn is_validated(&self) -> bool {
        matches!(
            self,
            Self::Param { check: Some(_), .. } | Self::Wildcard { check: Some(_), .. }
        )
    }
}

/// A fully parsed route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    /// The path portion as registered (e.g. `/users/:id`)
    pub path: String,
    /// Segments in tree order
    pub segments: Vec<Segment>,
    /// Tag names; `tags[0]` is always `route`
    pub tags: Vec<String>,
    /// Tag values, parallel to `tags`
    pub values: Vec<String>,
}

impl RoutePattern {
    /// Parse a registration pattern
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` for an empty or relative path, a
    /// nameless `:` parameter, an empty check, a wildcard that is not the last
    /// segment, or a metadata token that is not `key:value`.
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut tokens = pattern.split_whitespace();
        let path = tokens
            .next()
            .ok_or_else(|| Error::pattern(pattern, "empty pattern"))?;
        if !path.starts_with('/') {
            return Err(Error::pattern(pattern, "path must start with '/'"));
        }

        let raw = split_path(path);
        let mut segments = Vec::with_capacity(raw.len());
        for (i, token) in raw.iter().enumerate() {
            let segment = parse_segment(pattern, token)?;
            if matches!(segment, Segment::Wildcard { .. }) && i + 1 != raw.len() {
                return Err(Error::pattern(pattern, "wildcard must be the last segment"));
            }
            segments.push(segment);
        }

        let mut tags = vec![ROUTE_TAG.to_string()];
        let mut values = vec![path.to_string()];
        for token in tokens {
            match token.split_once(':') {
                Some((key, value)) if !key.is_empty() => {
                    tags.push(key.to_string());
                    values.push(value.to_string());
                }
                _ => {
                    return Err(Error::pattern(
                        pattern,
                        format!("metadata token '{token}' is not key:value"),
                    ))
                }
            }
        }

        Ok(Self {
            path: path.to_string(),
            segments,
            tags,
            values,
        })
    }

    /// Whether any segment carries a validation predicate
    #[must_use]
    pub fn has_validation(&self) -> bool {
        self.segments.iter().any(Segment::is_validated)
    }
}

fn parse_segment(pattern: &str, token: &str) -> Result<Segment> {
    let (is_param, body) = match token.as_bytes().first() {
        Some(b':') => (true, &token[1..]),
        Some(b'*') => (false, &token[1..]),
        _ => return Ok(Segment::Literal(token.to_string())),
    };

    let (name, check) = match body.split_once('|') {
        Some((_, "")) => {
            return Err(Error::pattern(pattern, format!("empty check in '{token}'")));
        }
        Some((name, check)) => (name, Some(check.to_string())),
        None => (body, None),
    };

    if is_param {
        if name.is_empty() {
            return Err(Error::pattern(pattern, "parameter without a name"));
        }
        Ok(Segment::Param {
            spelling: token.to_string(),
            name: name.to_string(),
            check,
        })
    } else {
        Ok(Segment::Wildcard {
            spelling: token.to_string(),
            name: if name.is_empty() { "*" } else { name }.to_string(),
            check,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_static() {
        let route = RoutePattern::parse("/users").unwrap();
        assert_eq!(route.segments, vec![Segment::Literal("/users".into())]);
        assert_eq!(route.tags, vec!["route"]);
        assert_eq!(route.values, vec!["/users"]);
        assert!(!route.has_validation());
    }

    #[test]
    fn test_parse_params_and_metadata() {
        let route =
            RoutePattern::parse("/api/v1/users/:id/files/*path   role:admin version:v1").unwrap();
        assert_eq!(route.path, "/api/v1/users/:id/files/*path");
        assert_eq!(route.segments.len(), 4);
        assert_eq!(
            route.segments[1],
            Segment::Param {
                spelling: ":id".into(),
                name: "id".into(),
                check: None
            }
        );
        assert_eq!(route.tags, vec!["route", "role", "version"]);
        assert_eq!(
            route.values,
            vec!["/api/v1/users/:id/files/*path", "admin", "v1"]
        );
    }

    #[test]
    fn test_parse_unnamed_wildcard() {
        let route = RoutePattern::parse("/static/*").unwrap();
        assert_eq!(
            route.segments[1],
            Segment::Wildcard {
                spelling: "*".into(),
                name: "*".into(),
                check: None
            }
        );
    }

    #[test]
    fn test_parse_validated() {
        let route = RoutePattern::parse(r"/x/:n|^\d+$/*rest|alpha").unwrap();
        assert!(route.has_validation());
        assert_eq!(
            route.segments[1],
            Segment::Param {
                spelling: r":n|^\d+$".into(),
                name: "n".into(),
                check: Some(r"^\d+$".into())
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(RoutePattern::parse("").is_err());
        assert!(RoutePattern::parse("   ").is_err());
        assert!(RoutePattern::parse("users").is_err());
        assert!(RoutePattern::parse("/a/:/b").is_err());
        assert!(RoutePattern::parse("/a/:id|").is_err());
        assert!(RoutePattern::parse("/a/*rest/b").is_err());
        assert!(RoutePattern::parse("/a role").is_err());
        assert!(RoutePattern::parse("/a :admin").is_err());
    }
}

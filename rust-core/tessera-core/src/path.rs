//! Path helpers shared by pattern parsing and tree insertion.

/// Split a route path into tree segments.
///
/// A `:` or `*` at the start of a path segment (position 0 or right after a
/// `/`) opens a token that runs up to the next `/`. Everything else collapses
/// into literal runs, trailing `/` included.
///
/// ```text
/// /api/v1/users/:id/files/*path  ->  ["/api/v1/users/", ":id", "/files/", "*path"]
/// //api/*                        ->  ["//api/", "*"]
/// /a/:b/                         ->  ["/a/", ":b", "/"]
/// /v1/users:batch                ->  ["/v1/users:batch"]
/// ```
#[must_use]
pub fn split_path(path: &str) -> Vec<&str> {
    let bytes = path.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let at_segment_start = i == 0 || bytes[i - 1] == b'/';
        if at_segment_start && matches!(bytes[i], b':' | b'*') {
            if start < i {
                segments.push(&path[start..i]);
            }
            let end = path[i..].find('/').map_or(path.len(), |p| i + p);
            segments.push(&path[i..end]);
            start = end;
            i = end;
        } else {
            i += 1;
        }
    }

    if start < bytes.len() {
        segments.push(&path[start..]);
    }
    segments
}

/// Byte length of the longest common prefix of `a` and `b`, never splitting a
/// UTF-8 character.
#[must_use]
pub fn longest_common_prefix(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map_or_else(
            || a.len().min(b.len()),
            |((idx, _), _)| idx,
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_params_and_wildcard() {
        assert_eq!(
            split_path("/api/v1/users/:id/files/*path"),
            vec!["/api/v1/users/", ":id", "/files/", "*path"]
        );
    }

    #[test]
    fn test_split_root_and_static() {
        assert_eq!(split_path("/"), vec!["/"]);
        assert_eq!(split_path("/static/css/"), vec!["/static/css/"]);
    }

    #[test]
    fn test_split_double_slash() {
        assert_eq!(split_path("//api/*"), vec!["//api/", "*"]);
    }

    #[test]
    fn test_split_trailing_slash_after_param() {
        assert_eq!(split_path("/a/:b/"), vec!["/a/", ":b", "/"]);
        assert_eq!(split_path("/:a/:b"), vec!["/", ":a", "/", ":b"]);
    }

    #[test]
    fn test_split_mid_segment_colon_is_literal() {
        assert_eq!(split_path("/v1/users:batch"), vec!["/v1/users:batch"]);
    }

    #[test]
    fn test_split_validated_tokens() {
        assert_eq!(
            split_path(r"/x/:n|^\d+$/*rest|alpha"),
            vec!["/x/", r":n|^\d+$", "/", "*rest|alpha"]
        );
    }

    #[test]
    fn test_split_empty() {
        assert!(split_path("").is_empty());
    }

    #[test]
    fn test_longest_common_prefix() {
        assert_eq!(longest_common_prefix("/users", "/user/1"), 5);
        assert_eq!(longest_common_prefix("/a", "/a"), 2);
        assert_eq!(longest_common_prefix("/a", "/abc"), 2);
        assert_eq!(longest_common_prefix("abc", "xyz"), 0);
        assert_eq!(longest_common_prefix("", "/"), 0);
    }

    #[test]
    fn test_longest_common_prefix_multibyte() {
        // 'é' and 'è' share their first UTF-8 byte
        assert_eq!(longest_common_prefix("/café", "/cafè"), 4);
    }
}

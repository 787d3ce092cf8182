//! Pulling values out of step responses.
//!
//! An extraction path is classified once by [`ExtractPath::parse`] into exactly
//! one strategy:
//!
//! | path | strategy |
//! |---|---|
//! | `$header.<Name>` | first value of the header (case-insensitive name) |
//! | `$regex.body.(<pattern>)` | regex over the body |
//! | `$regex.header.<Name>.(<pattern>)` | regex over the first value of a header |
//! | `$...` (anything else rooted at `$`) | JSONPath over the body |
//!
//! A definite JSONPath yields the selected node; an indefinite one (`[*]`, `..`,
//! filters, slices) yields the array of every matched node.
//!
//! Regex extractions return capture group 1 when the pattern has groups, the
//! whole match otherwise. Nothing here fails: a missing header, a non-matching
//! or invalid pattern, a missing JSON key or an unparseable body all mean
//! "no value".
mod json_path;

use regex::Regex;
use serde_json::Value;

use crate::http::DetailedResponse;

const HEADER_PREFIX: &str = "$header.";
const REGEX_BODY_PREFIX: &str = "$regex.body.";
const REGEX_HEADER_PREFIX: &str = "$regex.header.";

/// A classified extraction path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractPath<'a> {
    Header(&'a str),
    RegexBody {
        pattern: &'a str,
    },
    RegexHeader {
        header: &'a str,
        pattern: &'a str,
    },
    JsonPath(&'a str),
    Unsupported,
}

impl<'a> ExtractPath<'a> {
    pub fn parse(path: &'a str) -> Self {
        if let Some(name) = path.strip_prefix(HEADER_PREFIX) {
            return ExtractPath::Header(name);
        }
        if let Some(pattern) = path.strip_prefix(REGEX_BODY_PREFIX) {
            return ExtractPath::RegexBody {
                pattern: unwrap_parens(pattern),
            };
        }
        if let Some(rest) = path.strip_prefix(REGEX_HEADER_PREFIX) {
            return match rest.split_once('.') {
                Some((header, pattern)) => ExtractPath::RegexHeader {
                    header,
                    pattern: unwrap_parens(pattern),
                },
                None => ExtractPath::Unsupported,
            };
        }
        if path.starts_with("$header") || path.starts_with("$regex") {
            return ExtractPath::Unsupported;
        }
        if path.starts_with('$') {
            return ExtractPath::JsonPath(path);
        }
        ExtractPath::Unsupported
    }

    /// Applies the strategy to a response.
    pub fn extract(&self, response: &DetailedResponse) -> Option<Value> {
        match *self {
            ExtractPath::Header(name) => response.header(name).map(Value::from),
            ExtractPath::RegexBody { pattern } => {
                if response.body.trim().is_empty() {
                    return None;
                }
                find(pattern, &response.body)
            }
            ExtractPath::RegexHeader { header, pattern } => find(pattern, response.header(header)?),
            ExtractPath::JsonPath(path) => json_path::evaluate(&response.body, path),
            ExtractPath::Unsupported => None,
        }
    }
}

/// Classifies `path` and applies it to `response`.
pub fn extract(response: &DetailedResponse, path: &str) -> Option<Value> {
    ExtractPath::parse(path).extract(response)
}

/// `(pattern)` -> `pattern`; anything else is returned as is.
fn unwrap_parens(pattern: &str) -> &str {
    pattern
        .strip_prefix('(')
        .and_then(|p| p.strip_suffix(')'))
        .unwrap_or(pattern)
}

fn find(pattern: &str, text: &str) -> Option<Value> {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::debug!("Ignoring invalid extraction pattern {pattern:?}: {e}");
            return None;
        }
    };
    let caps = re.captures(text)?;
    let matched = if caps.len() > 1 { caps.get(1)? } else { caps.get(0)? };
    Some(Value::from(matched.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn response(body: &str, headers: &[(&str, &str)]) -> DetailedResponse {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (k, v) in headers {
            map.entry(k.to_string()).or_default().push(v.to_string());
        }
        DetailedResponse {
            status_code: 200,
            latency_ms: 5,
            body: body.to_string(),
            headers: map,
        }
    }

    mod dispatch {
        use super::*;

        #[test]
        fn every_path_has_exactly_one_strategy() {
            assert_eq!(ExtractPath::parse("$header.Set-Cookie"), ExtractPath::Header("Set-Cookie"));
            assert_eq!(
                ExtractPath::parse("$regex.body.(id=(\\d+))"),
                ExtractPath::RegexBody { pattern: "id=(\\d+)" }
            );
            assert_eq!(
                ExtractPath::parse("$regex.header.Location.(/users/(\\d+))"),
                ExtractPath::RegexHeader {
                    header: "Location",
                    pattern: "/users/(\\d+)"
                }
            );
            assert_eq!(ExtractPath::parse("$.data.token"), ExtractPath::JsonPath("$.data.token"));
        }

        #[test]
        fn reserved_prefixes_never_fall_through_to_json() {
            assert_eq!(ExtractPath::parse("$headers"), ExtractPath::Unsupported);
            assert_eq!(ExtractPath::parse("$regex.query.(x)"), ExtractPath::Unsupported);
            assert_eq!(ExtractPath::parse("$regex.header.NoPattern"), ExtractPath::Unsupported);
            assert_eq!(ExtractPath::parse("data.token"), ExtractPath::Unsupported);
        }

        #[test]
        fn unparenthesized_patterns_are_kept() {
            assert_eq!(
                ExtractPath::parse("$regex.body.id=\\d+"),
                ExtractPath::RegexBody { pattern: "id=\\d+" }
            );
        }
    }

    mod json {
        use super::*;

        #[test]
        fn extracts_nested_value() {
            let r = response(r#"{"data":{"token":"xyz"}}"#, &[]);
            assert_eq!(extract(&r, "$.data.token"), Some(json!("xyz")));
        }

        #[test]
        fn indefinite_paths_return_every_match() {
            let r = response(r#"{"items":[{"id":1},{"id":2}],"meta":{"token":"t"}}"#, &[]);
            assert_eq!(extract(&r, "$.items[*].id"), Some(json!([1, 2])));
            assert_eq!(extract(&r, "$..token"), Some(json!(["t"])));
            assert_eq!(extract(&r, "$.items[?(@.id > 1)].id"), Some(json!([2])));
        }

        #[test]
        fn invalid_body_is_empty() {
            let r = response("not json", &[]);
            assert_eq!(extract(&r, "$.data.token"), None);
        }
    }

    mod header {
        use super::*;

        #[test]
        fn returns_first_value() {
            let r = response("", &[("Set-Cookie", "session=1"), ("Set-Cookie", "theme=dark")]);
            assert_eq!(extract(&r, "$header.Set-Cookie"), Some(json!("session=1")));
            assert_eq!(extract(&r, "$header.set-cookie"), Some(json!("session=1")));
        }

        #[test]
        fn absent_header_is_empty() {
            let r = response("", &[]);
            assert_eq!(extract(&r, "$header.Set-Cookie"), None);
        }
    }

    mod pattern {
        use super::*;

        #[test]
        fn uses_first_group() {
            let r = response("id=42", &[]);
            assert_eq!(extract(&r, r"$regex.body.(id=(\d+))"), Some(json!("42")));
        }

        #[test]
        fn whole_match_without_groups() {
            let r = response("order id=42 created", &[]);
            assert_eq!(extract(&r, r"$regex.body.(id=\d+)"), Some(json!("id=42")));
        }

        #[test]
        fn searches_header_values() {
            let r = response("", &[("Location", "/users/77")]);
            assert_eq!(
                extract(&r, r"$regex.header.Location.(/users/(\d+))"),
                Some(json!("77"))
            );
            assert_eq!(extract(&r, r"$regex.header.Missing.(\d+)"), None);
        }

        #[test]
        fn failures_are_empty() {
            let r = response("id=abc", &[]);
            assert_eq!(extract(&r, r"$regex.body.(id=(\d+))"), None);
            assert_eq!(extract(&r, r"$regex.body.((unclosed)"), None);
            assert_eq!(extract(&response("  ", &[]), r"$regex.body.(\s+)"), None);
        }
    }
}

//! Path template matching logic.
//!
//! # Responsibilities
//! - Store (template, payload) pairs in registration order
//! - Match a concrete request path against them
//! - Extract named path parameters from the winning template
//!
//! # Design Decisions
//! - First registered template that matches the whole path wins
//! - Path matching is case-sensitive
//! - Percent-encoding is the transport's concern; segments compared verbatim
//! - No regex to guarantee O(n) matching

use std::collections::HashMap;

use crate::routing::template::{PathTemplate, Segment};

/// Result of a successful path match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatchResult<'a, T> {
    /// Payload registered with the winning template.
    pub value: &'a T,
    /// The winning template as written.
    pub template: &'a str,
    /// Values bound to named segments.
    pub parameters: HashMap<String, String>,
}

/// Ordered set of path templates with attached payloads.
///
/// Immutable once built; concurrent reads need no synchronization.
#[derive(Debug, Clone)]
pub struct PathTemplateMatcher<T> {
    entries: Vec<(PathTemplate, T)>,
}

impl<T> Default for PathTemplateMatcher<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> PathTemplateMatcher<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template. Earlier registrations take precedence.
    pub fn add(&mut self, template: PathTemplate, payload: T) {
        self.entries.push((template, payload));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate registered templates and payloads in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathTemplate, &T)> {
        self.entries.iter().map(|(t, v)| (t, v))
    }

    /// Match a concrete path. A missing leading '/' is added before matching.
    pub fn match_path(&self, path: &str) -> Option<PathMatchResult<'_, T>> {
        let normalized = path.strip_prefix('/').unwrap_or(path);
        let concrete: Vec<&str> = if normalized.is_empty() {
            Vec::new()
        } else {
            normalized.split('/').collect()
        };

        self.entries.iter().find_map(|(template, value)| {
            bind(template, &concrete).map(|parameters| PathMatchResult {
                value,
                template: template.as_str(),
                parameters,
            })
        })
    }
}

/// Bind a template to concrete segments, returning the parameter map on success.
fn bind(template: &PathTemplate, concrete: &[&str]) -> Option<HashMap<String, String>> {
    let mut parameters = HashMap::new();
    let mut remaining = concrete.iter();

    for segment in template.segments() {
        match segment {
            Segment::Wildcard => return Some(parameters),
            Segment::Literal(literal) => {
                if remaining.next() != Some(&literal.as_str()) {
                    return None;
                }
            }
            Segment::Param(name) => match remaining.next() {
                Some(value) if !value.is_empty() => {
                    parameters.insert(name.clone(), (*value).to_string());
                }
                _ => return None,
            },
        }
    }

    // Every concrete segment must be consumed unless a wildcard ended the template.
    remaining.next().is_none().then_some(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(templates: &[&str]) -> PathTemplateMatcher<usize> {
        let mut m = PathTemplateMatcher::new();
        for (i, t) in templates.iter().enumerate() {
            m.add(PathTemplate::parse(t).unwrap(), i);
        }
        m
    }

    #[test]
    fn test_named_parameter_binding() {
        let m = matcher(&["/chat/{room}"]);
        let result = m.match_path("/chat/lobby").unwrap();
        assert_eq!(*result.value, 0);
        assert_eq!(result.template, "/chat/{room}");
        assert_eq!(result.parameters.get("room").map(String::as_str), Some("lobby"));
    }

    #[test]
    fn test_no_match() {
        let m = matcher(&["/chat/{room}"]);
        assert!(m.match_path("/other").is_none());
        assert!(m.match_path("/chat").is_none());
        assert!(m.match_path("/chat/lobby/extra").is_none());
        // Parameters never bind an empty segment.
        assert!(m.match_path("/chat/").is_none());
    }

    #[test]
    fn test_leading_slash_is_normalized() {
        let m = matcher(&["/chat/{room}"]);
        assert!(m.match_path("chat/lobby").is_some());
    }

    #[test]
    fn test_literal_matching_is_case_sensitive() {
        let m = matcher(&["/Chat"]);
        assert!(m.match_path("/Chat").is_some());
        assert!(m.match_path("/chat").is_none());
    }

    #[test]
    fn test_no_percent_decoding() {
        let m = matcher(&["/a b"]);
        assert!(m.match_path("/a%20b").is_none());
    }

    #[test]
    fn test_wildcard_matches_any_suffix_and_binds_nothing() {
        let m = matcher(&["/files/*"]);
        for path in ["/files", "/files/", "/files/a", "/files/a/b/c"] {
            let result = m.match_path(path).unwrap_or_else(|| panic!("{path} should match"));
            assert!(result.parameters.is_empty());
        }
        assert!(m.match_path("/other/a").is_none());
    }

    #[test]
    fn test_first_registered_template_wins() {
        let m = matcher(&["/chat/{room}", "/chat/lobby", "/*"]);
        assert_eq!(*m.match_path("/chat/lobby").unwrap().value, 0);
        assert_eq!(*m.match_path("/anything/else").unwrap().value, 2);
    }

    #[test]
    fn test_root_template() {
        let m = matcher(&["/"]);
        assert!(m.match_path("/").is_some());
        assert!(m.match_path("").is_some());
        assert!(m.match_path("/x").is_none());
    }

    #[test]
    fn test_matching_is_idempotent() {
        let m = matcher(&["/a/{x}/b/{y}", "/a/*"]);
        let first = m.match_path("/a/1/b/2");
        let second = m.match_path("/a/1/b/2");
        assert_eq!(first, second);
        let params = first.unwrap().parameters;
        assert_eq!(params.len(), 2);
        assert_eq!(params["x"], "1");
        assert_eq!(params["y"], "2");
    }
}

//! Path template parsing.
//!
//! # Syntax
//! - Literal segment: `chat`
//! - Named parameter: `{room}` (matches exactly one non-empty segment)
//! - Trailing wildcard: `*` (matches any remaining suffix, never bound)
//!
//! # Design Decisions
//! - Templates are parsed once at startup; matching never re-parses
//! - Segment comparison is case-sensitive and does no percent decoding

use std::fmt;
use thiserror::Error;

/// Errors produced while parsing a path template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template `{0}` must start with '/'")]
    MissingLeadingSlash(String),

    #[error("template `{0}` contains an empty parameter name")]
    EmptyParameter(String),

    #[error("template `{template}` declares parameter `{name}` more than once")]
    DuplicateParameter { template: String, name: String },

    #[error("template `{0}` has unbalanced braces")]
    UnbalancedBraces(String),

    #[error("template `{0}` has a wildcard that is not the last segment")]
    WildcardNotLast(String),
}

/// A single parsed template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// A parsed path template such as `/chat/{room}` or `/files/*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template string.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(TemplateError::MissingLeadingSlash(raw.to_string()));
        };

        let parts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };

        let mut segments = Vec::with_capacity(parts.len());
        let mut names: Vec<&str> = Vec::new();

        for (i, part) in parts.iter().enumerate() {
            if *part == "*" {
                if i + 1 != parts.len() {
                    return Err(TemplateError::WildcardNotLast(raw.to_string()));
                }
                segments.push(Segment::Wildcard);
                continue;
            }

            if let Some(inner) = part.strip_prefix('{') {
                let name = inner
                    .strip_suffix('}')
                    .ok_or_else(|| TemplateError::UnbalancedBraces(raw.to_string()))?;
                if name.contains('{') || name.contains('}') {
                    return Err(TemplateError::UnbalancedBraces(raw.to_string()));
                }
                if name.is_empty() {
                    return Err(TemplateError::EmptyParameter(raw.to_string()));
                }
                if names.contains(&name) {
                    return Err(TemplateError::DuplicateParameter {
                        template: raw.to_string(),
                        name: name.to_string(),
                    });
                }
                names.push(name);
                segments.push(Segment::Param(name.to_string()));
                continue;
            }

            if part.contains('{') || part.contains('}') {
                return Err(TemplateError::UnbalancedBraces(raw.to_string()));
            }
            segments.push(Segment::Literal(part.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The template as written in configuration.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of all parameter segments, in template order.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for PathTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

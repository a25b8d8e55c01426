//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming upgrade request (path)
//!     → matcher.rs (walk templates in registration order)
//!     → template.rs (segment-by-segment comparison)
//!     → Return: payload + path parameters, or no match
//!
//! Template Compilation (at startup):
//!     EndpointConfig[].path
//!     → template.rs (parse literals, {params}, trailing *)
//!     → matcher.rs (ordered, immutable after sealing)
//! ```
//!
//! # Design Decisions
//! - Templates compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same template
//! - First match wins (registration order)

pub mod matcher;
pub mod template;

pub use matcher::{PathMatchResult, PathTemplateMatcher};
pub use template::{PathTemplate, Segment, TemplateError};

//! Endpoint registration.
//!
//! # Data Flow
//! ```text
//! EndpointConfig[] (startup)
//!     → EndpointRegistration (template + ordered negotiators)
//!     → EndpointRegistryBuilder::register
//!     → seal() → EndpointRegistry (immutable, shared via Arc)
//! ```
//!
//! # Design Decisions
//! - Only a sealed registry can back a dispatcher; there is no way to
//!   register endpoints after dispatch starts
//! - Registration order is matching order

pub mod registry;

pub use registry::{EndpointRegistration, EndpointRegistry, EndpointRegistryBuilder, RegistryError};

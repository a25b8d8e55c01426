//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → endpoint registry built and sealed from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; endpoints cannot change after sealing,
//!   so there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, EndpointConfig, GatewayConfig, HandlerKind, IdentityConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, SessionConfig, ShutdownConfig, TimeoutConfig, TokenConfig,
};
pub use validation::{validate_config, ValidationError};

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the upgrade gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// WebSocket endpoints, in matching order.
    pub endpoints: Vec<EndpointConfig>,

    /// Bearer tokens recognized by the identity layer.
    pub identity: IdentityConfig,

    /// Session keepalive and fan-out settings.
    pub sessions: SessionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent HTTP requests in flight (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Built-in session behaviours an endpoint can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    /// Reply to the sender with the same message.
    #[default]
    Echo,
    /// Forward each message to every session in the same group.
    Broadcast,
}

/// A WebSocket endpoint mapping a path template to handshake negotiators.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Endpoint identifier for logging/metrics.
    pub name: String,

    /// Path template, e.g. "/chat/{room}".
    pub path: String,

    /// Session behaviour.
    #[serde(default)]
    pub handler: HandlerKind,

    /// Accepted `Sec-WebSocket-Version` values, in negotiation order.
    #[serde(default = "default_versions")]
    pub versions: Vec<u8>,

    /// Supported sub-protocols.
    #[serde(default)]
    pub subprotocols: Vec<String>,

    /// Maximum size of a single inbound message.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Path parameter used to group broadcast sessions (e.g. "room").
    #[serde(default)]
    pub group_param: Option<String>,
}

fn default_versions() -> Vec<u8> {
    vec![13, 8, 7]
}

fn default_max_message_bytes() -> usize {
    64 * 1024
}

/// Identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    pub tokens: Vec<TokenConfig>,
}

/// A static bearer token and the identity it establishes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    pub token: String,
    pub principal: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interval between server pings in seconds.
    pub ping_interval_secs: u64,

    /// Close sessions with no inbound traffic for this long.
    pub idle_timeout_secs: u64,

    /// Buffered messages per broadcast group before slow sessions lag.
    pub broadcast_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 30,
            idle_timeout_secs: 300,
            broadcast_capacity: 256,
        }
    }
}

/// Timeout configuration for plain HTTP requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for sessions to close before exiting.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_endpoint_gets_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [[endpoints]]
            name = "chat"
            path = "/chat/{room}"
            handler = "broadcast"
            group_param = "room"
            "#,
        )
        .unwrap();

        let ep = &config.endpoints[0];
        assert_eq!(ep.handler, HandlerKind::Broadcast);
        assert_eq!(ep.versions, vec![13, 8, 7]);
        assert_eq!(ep.max_message_bytes, 64 * 1024);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }
}

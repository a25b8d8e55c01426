//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check endpoint templates parse and do not collide
//! - Validate value ranges (intervals > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{GatewayConfig, HandlerKind};
use crate::negotiation::WebSocketVersion;
use crate::routing::PathTemplate;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address `{value}`")]
    InvalidAddress { field: &'static str, value: String },

    #[error("endpoint `{endpoint}`: {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("duplicate endpoint name `{0}`")]
    DuplicateName(String),

    #[error("duplicate endpoint path `{0}`")]
    DuplicatePath(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("identity.tokens[{0}]: token and principal must not be empty")]
    EmptyToken(usize),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address("listener.bind_address", &config.listener.bind_address, &mut errors);
    if config.observability.metrics_enabled {
        check_address("observability.metrics_address", &config.observability.metrics_address, &mut errors);
    }
    if config.admin.enabled {
        check_address("admin.bind_address", &config.admin.bind_address, &mut errors);
    }

    let mut names = HashSet::new();
    let mut paths = HashSet::new();
    for endpoint in &config.endpoints {
        let mut reject = |reason: String| {
            errors.push(ValidationError::Endpoint {
                endpoint: endpoint.name.clone(),
                reason,
            })
        };

        match PathTemplate::parse(&endpoint.path) {
            Ok(template) => {
                if let Some(param) = &endpoint.group_param {
                    if !template.parameter_names().any(|p| p == param) {
                        reject(format!("group_param `{param}` is not a parameter of `{}`", endpoint.path));
                    }
                }
            }
            Err(e) => reject(e.to_string()),
        }

        if endpoint.versions.is_empty() {
            reject("versions must not be empty".to_string());
        }
        for version in &endpoint.versions {
            if WebSocketVersion::from_number(*version).is_none() {
                reject(format!("unsupported versions entry {version}"));
            }
        }
        if endpoint.max_message_bytes == 0 {
            reject("max_message_bytes must be greater than zero".to_string());
        }
        if endpoint.handler == HandlerKind::Echo && endpoint.group_param.is_some() {
            reject("group_param only applies to broadcast endpoints".to_string());
        }

        if !names.insert(endpoint.name.as_str()) {
            errors.push(ValidationError::DuplicateName(endpoint.name.clone()));
        }
        if !paths.insert(endpoint.path.as_str()) {
            errors.push(ValidationError::DuplicatePath(endpoint.path.clone()));
        }
    }

    for (i, token) in config.identity.tokens.iter().enumerate() {
        if token.token.trim().is_empty() || token.principal.trim().is_empty() {
            errors.push(ValidationError::EmptyToken(i));
        }
    }

    if config.sessions.ping_interval_secs == 0 {
        errors.push(ValidationError::Zero("sessions.ping_interval_secs"));
    }
    if config.sessions.idle_timeout_secs == 0 {
        errors.push(ValidationError::Zero("sessions.idle_timeout_secs"));
    }
    if config.sessions.broadcast_capacity == 0 {
        errors.push(ValidationError::Zero("sessions.broadcast_capacity"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{EndpointConfig, TokenConfig};

    fn endpoint(name: &str, path: &str) -> EndpointConfig {
        EndpointConfig {
            name: name.into(),
            path: path.into(),
            handler: HandlerKind::Echo,
            versions: vec![13],
            subprotocols: Vec::new(),
            max_message_bytes: 1024,
            group_param: None,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.endpoints.push(endpoint("a", "/a"));
        config.endpoints.push(endpoint("a", "/a"));
        config.endpoints.push(endpoint("b", "/b/{"));
        config.sessions.ping_interval_secs = 0;
        config.identity.tokens.push(TokenConfig {
            token: " ".into(),
            principal: "p".into(),
            roles: Vec::new(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: "nowhere".into()
        }));
        assert!(errors.contains(&ValidationError::DuplicateName("a".into())));
        assert!(errors.contains(&ValidationError::DuplicatePath("/a".into())));
        assert!(errors.contains(&ValidationError::Zero("sessions.ping_interval_secs")));
        assert!(errors.contains(&ValidationError::EmptyToken(0)));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::Endpoint { endpoint, .. } if endpoint == "b")));
    }

    #[test]
    fn rejects_unknown_versions_and_bad_group_param() {
        let mut config = GatewayConfig::default();
        let mut ep = endpoint("chat", "/chat/{room}");
        ep.versions = vec![13, 42];
        ep.handler = HandlerKind::Broadcast;
        ep.group_param = Some("channel".into());
        config.endpoints.push(ep);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}

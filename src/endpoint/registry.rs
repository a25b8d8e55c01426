//! Endpoint registry and sealing.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::EndpointConfig;
use crate::negotiation::{ConnectionConfig, HandshakeNegotiator, HybiHandshake, WebSocketVersion};
use crate::routing::{PathMatchResult, PathTemplate, PathTemplateMatcher, TemplateError};

/// Errors raised while building or sealing the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("endpoint `{endpoint}`: {source}")]
    Template {
        endpoint: String,
        #[source]
        source: TemplateError,
    },

    #[error("endpoint `{endpoint}`: unsupported WebSocket version {version}")]
    UnsupportedVersion { endpoint: String, version: u8 },

    #[error("endpoint `{0}` has no handshake negotiators")]
    NoNegotiators(String),

    #[error("endpoint name `{0}` registered twice")]
    DuplicateName(String),

    #[error("path template `{0}` registered twice")]
    DuplicateTemplate(String),
}

/// A WebSocket endpoint: a path template plus its ordered handshake candidates.
#[derive(Clone)]
pub struct EndpointRegistration {
    name: String,
    template: PathTemplate,
    negotiators: Vec<Arc<dyn HandshakeNegotiator>>,
}

impl EndpointRegistration {
    pub fn new(name: impl Into<String>, template: PathTemplate) -> Self {
        Self {
            name: name.into(),
            template,
            negotiators: Vec::new(),
        }
    }

    /// Append a negotiator; earlier negotiators are asked first.
    pub fn with_negotiator(mut self, negotiator: Arc<dyn HandshakeNegotiator>) -> Self {
        self.negotiators.push(negotiator);
        self
    }

    /// Build a registration with one `HybiHandshake` per configured version.
    pub fn from_config(config: &EndpointConfig) -> Result<Self, RegistryError> {
        let template = PathTemplate::parse(&config.path).map_err(|source| RegistryError::Template {
            endpoint: config.name.clone(),
            source,
        })?;

        let mut registration = Self::new(&config.name, template);
        for number in &config.versions {
            let version = WebSocketVersion::from_number(*number).ok_or_else(|| RegistryError::UnsupportedVersion {
                endpoint: config.name.clone(),
                version: *number,
            })?;
            let negotiator = HybiHandshake::new(ConnectionConfig {
                endpoint: config.name.clone(),
                version,
                subprotocols: config.subprotocols.clone(),
                max_message_bytes: config.max_message_bytes,
            });
            registration = registration.with_negotiator(Arc::new(negotiator));
        }
        Ok(registration)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    pub fn negotiators(&self) -> &[Arc<dyn HandshakeNegotiator>] {
        &self.negotiators
    }
}

impl std::fmt::Debug for EndpointRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointRegistration")
            .field("name", &self.name)
            .field("template", &self.template.as_str())
            .field("negotiators", &self.negotiators.iter().map(|n| n.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Collects registrations until the deployment is complete.
#[derive(Default)]
pub struct EndpointRegistryBuilder {
    registrations: Vec<EndpointRegistration>,
}

impl EndpointRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, registration: EndpointRegistration) -> &mut Self {
        self.registrations.push(registration);
        self
    }

    /// Freeze the registrations into an immutable registry.
    pub fn seal(self) -> Result<EndpointRegistry, RegistryError> {
        let mut names = HashSet::new();
        let mut templates = HashSet::new();
        let mut matcher = PathTemplateMatcher::new();

        for registration in self.registrations {
            if registration.negotiators.is_empty() {
                return Err(RegistryError::NoNegotiators(registration.name));
            }
            if !names.insert(registration.name.clone()) {
                return Err(RegistryError::DuplicateName(registration.name));
            }
            if !templates.insert(registration.template.as_str().to_string()) {
                return Err(RegistryError::DuplicateTemplate(registration.template.as_str().to_string()));
            }
            matcher.add(registration.template.clone(), registration);
        }

        tracing::info!(endpoints = matcher.len(), "Endpoint registry sealed");
        Ok(EndpointRegistry { matcher })
    }
}

/// Summary of a registered endpoint, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSummary {
    pub name: String,
    pub path: String,
    pub negotiators: Vec<String>,
}

/// Sealed, read-only set of endpoints shared by all dispatches.
#[derive(Debug)]
pub struct EndpointRegistry {
    matcher: PathTemplateMatcher<EndpointRegistration>,
}

impl EndpointRegistry {
    pub fn builder() -> EndpointRegistryBuilder {
        EndpointRegistryBuilder::new()
    }

    /// Build and seal a registry from configuration.
    pub fn from_config(endpoints: &[EndpointConfig]) -> Result<Self, RegistryError> {
        let mut builder = Self::builder();
        for endpoint in endpoints {
            builder.register(EndpointRegistration::from_config(endpoint)?);
        }
        builder.seal()
    }

    pub fn match_path(&self, path: &str) -> Option<PathMatchResult<'_, EndpointRegistration>> {
        self.matcher.match_path(path)
    }

    pub fn len(&self) -> usize {
        self.matcher.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }

    pub fn summaries(&self) -> Vec<EndpointSummary> {
        self.matcher
            .iter()
            .map(|(template, registration)| EndpointSummary {
                name: registration.name.clone(),
                path: template.as_str().to_string(),
                negotiators: registration.negotiators.iter().map(|n| n.name().to_string()).collect(),
            })
            .collect()
    }
}

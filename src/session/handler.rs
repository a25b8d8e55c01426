//! Per-endpoint message handling.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_tungstenite::tungstenite::Message;

use crate::config::{EndpointConfig, HandlerKind};
use crate::session::SessionInfo;

/// What to do with the result of handling a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    None,
    /// Send back to the originating session.
    Sender(Message),
    /// Send to every session in the originating session's group.
    Group(Message),
}

/// Application behaviour attached to an endpoint.
pub trait EndpointHandler: Send + Sync {
    /// Broadcast group the session joins, if any.
    fn group(&self, _info: &SessionInfo) -> Option<String> {
        None
    }

    fn on_message(&self, info: &SessionInfo, message: Message) -> Reply;
}

/// Replies to the sender with the received message.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

impl EndpointHandler for EchoHandler {
    fn on_message(&self, _info: &SessionInfo, message: Message) -> Reply {
        Reply::Sender(message)
    }
}

/// Relays each message to all sessions of the same group, sender included.
#[derive(Debug, Default, Clone)]
pub struct BroadcastHandler {
    group_param: Option<String>,
}

impl BroadcastHandler {
    pub fn new(group_param: Option<String>) -> Self {
        Self { group_param }
    }
}

impl EndpointHandler for BroadcastHandler {
    fn group(&self, info: &SessionInfo) -> Option<String> {
        match &self.group_param {
            Some(param) => info
                .path_params
                .get(param)
                .map(|value| format!("{}:{}", info.endpoint, value)),
            None => Some(info.endpoint.clone()),
        }
    }

    fn on_message(&self, _info: &SessionInfo, message: Message) -> Reply {
        Reply::Group(message)
    }
}

/// Build the handler table for the configured endpoints.
pub fn handlers_from_config(endpoints: &[EndpointConfig]) -> HashMap<String, Arc<dyn EndpointHandler>> {
    endpoints
        .iter()
        .map(|ep| {
            let handler: Arc<dyn EndpointHandler> = match ep.handler {
                HandlerKind::Echo => Arc::new(EchoHandler),
                HandlerKind::Broadcast => Arc::new(BroadcastHandler::new(ep.group_param.clone())),
            };
            (ep.name.clone(), handler)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;

    fn info(params: &[(&str, &str)]) -> SessionInfo {
        SessionInfo {
            id: SessionId::new(),
            endpoint: "chat".into(),
            path: "/chat/lobby".into(),
            path_params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            principal: None,
            subprotocol: None,
            group: None,
            connected_at: 0,
        }
    }

    #[test]
    fn broadcast_groups_by_path_parameter() {
        let handler = BroadcastHandler::new(Some("room".into()));
        assert_eq!(handler.group(&info(&[("room", "lobby")])), Some("chat:lobby".to_string()));
        assert_eq!(handler.group(&info(&[])), None);
        assert_eq!(BroadcastHandler::new(None).group(&info(&[])), Some("chat".to_string()));
    }

    #[test]
    fn echo_replies_to_sender() {
        let msg = Message::text("hi");
        assert_eq!(EchoHandler.on_message(&info(&[]), msg.clone()), Reply::Sender(msg));
        assert_eq!(EchoHandler.group(&info(&[])), None);
    }
}

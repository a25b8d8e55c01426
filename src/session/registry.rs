//! Live session tracking and per-session driver tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::{
    protocol::{frame::coding::CloseCode, CloseFrame},
    Message, Utf8Bytes,
};
use tracing::Instrument;

use crate::config::SessionConfig;
use crate::lifecycle::{ContainerLifecycle, Shutdown};
use crate::negotiation::{ConnectionConfig, HandshakeContext, Transport};
use crate::observability::metrics;
use crate::session::{EchoHandler, EndpointHandler, Reply, SessionFactory, SessionHandle, SessionId, SessionInfo};

struct Inner {
    sessions: DashMap<SessionId, SessionInfo>,
    groups: DashMap<String, broadcast::Sender<Message>>,
    handlers: HashMap<String, Arc<dyn EndpointHandler>>,
    fallback: Arc<dyn EndpointHandler>,
    config: SessionConfig,
    shutdown: Shutdown,
}

/// Default [`SessionFactory`]: registers sessions and drives them until close.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl SessionRegistry {
    pub fn new(
        config: SessionConfig,
        handlers: HashMap<String, Arc<dyn EndpointHandler>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: DashMap::new(),
                groups: DashMap::new(),
                handlers,
                fallback: Arc::new(EchoHandler),
                config,
                shutdown,
            }),
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    pub fn get(&self, id: SessionId) -> Option<SessionInfo> {
        self.inner.sessions.get(&id).map(|r| r.value().clone())
    }

    /// Snapshot of all live sessions.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<_> = self.inner.sessions.iter().map(|r| r.value().clone()).collect();
        sessions.sort_by_key(|s| s.id.as_u64());
        sessions
    }

    /// Wait until every session has closed or the timeout elapses.
    /// Returns false if sessions were still open at the deadline.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.inner.sessions.is_empty() {
            if Instant::now() >= deadline {
                tracing::warn!(remaining = self.inner.sessions.len(), "Session drain timed out");
                return false;
            }
            time::sleep(Duration::from_millis(50)).await;
        }
        true
    }
}

impl SessionFactory for SessionRegistry {
    fn connected(
        &self,
        transport: Transport,
        config: ConnectionConfig,
        subprotocol: Option<String>,
        ctx: HandshakeContext,
    ) -> SessionHandle {
        let handler = self
            .inner
            .handlers
            .get(&config.endpoint)
            .cloned()
            .unwrap_or_else(|| self.inner.fallback.clone());

        let mut info = SessionInfo {
            id: SessionId::new(),
            endpoint: config.endpoint.clone(),
            path: ctx.path,
            path_params: ctx.path_params,
            principal: ctx.principal,
            subprotocol,
            group: None,
            connected_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };
        info.group = handler.group(&info);

        // Join the group and subscribe to shutdown before the session is visible.
        let group = info.group.as_ref().map(|key| {
            // Subscribe while holding the shard lock so a concurrent finish()
            // cannot remove the channel between lookup and subscribe.
            let entry = self
                .inner
                .groups
                .entry(key.clone())
                .or_insert_with(|| broadcast::channel(self.inner.config.broadcast_capacity).0);
            let rx = entry.subscribe();
            let tx = entry.value().clone();
            (key.clone(), tx, rx)
        });
        let shutdown_rx = self.inner.shutdown.subscribe();

        let handle = SessionHandle {
            id: info.id,
            endpoint: info.endpoint.clone(),
        };
        self.inner.sessions.insert(info.id, info.clone());
        metrics::session_opened(&info.endpoint);

        tracing::info!(
            session_id = %info.id,
            endpoint = %info.endpoint,
            principal = info.principal.as_ref().map(|p| p.name()).unwrap_or("anonymous"),
            group = info.group.as_deref().unwrap_or("-"),
            "Session registered"
        );

        let span = tracing::info_span!("session", session_id = %info.id);
        let driver = Driver {
            inner: self.inner.clone(),
            info,
            handler,
            group,
            shutdown_rx,
        };
        tokio::spawn(driver.run(transport).instrument(span));

        handle
    }
}

struct Driver {
    inner: Arc<Inner>,
    info: SessionInfo,
    handler: Arc<dyn EndpointHandler>,
    group: Option<(String, broadcast::Sender<Message>, broadcast::Receiver<Message>)>,
    shutdown_rx: broadcast::Receiver<()>,
}

fn close_frame(code: CloseCode, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    }))
}

async fn recv_group(group: &mut Option<(String, broadcast::Sender<Message>, broadcast::Receiver<Message>)>) -> Result<Message, RecvError> {
    match group {
        Some((_, _, rx)) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl Driver {
    async fn run(mut self, mut transport: Transport) {
        let ping_every = Duration::from_secs(self.inner.config.ping_interval_secs);
        let idle_timeout = Duration::from_secs(self.inner.config.idle_timeout_secs);
        let mut ping = time::interval_at(Instant::now() + ping_every, ping_every);
        let mut last_seen = Instant::now();

        // Shutdown may have fired before we subscribed.
        if self.inner.shutdown.is_shutting_down() {
            let _ = transport.send(close_frame(CloseCode::Away, "server shutting down")).await;
            self.finish();
            return;
        }

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    tracing::debug!("Closing session for shutdown");
                    let _ = transport.send(close_frame(CloseCode::Away, "server shutting down")).await;
                    break;
                }
                _ = ping.tick() => {
                    if last_seen.elapsed() >= idle_timeout {
                        tracing::info!("Closing idle session");
                        let _ = transport.send(close_frame(CloseCode::Policy, "idle timeout")).await;
                        break;
                    }
                    if transport.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
                incoming = transport.next() => match incoming {
                    Some(Ok(message)) => {
                        last_seen = Instant::now();
                        if !(message.is_text() || message.is_binary()) {
                            // Pings are answered by the protocol layer; close
                            // replies are flushed by the next read.
                            continue;
                        }
                        metrics::record_session_message(&self.info.endpoint);
                        let outgoing = match self.handler.on_message(&self.info, message) {
                            Reply::None => None,
                            Reply::Sender(m) => Some(m),
                            Reply::Group(m) => match &self.group {
                                Some((_, tx, _)) => {
                                    let _ = tx.send(m);
                                    None
                                }
                                None => Some(m),
                            },
                        };
                        if let Some(m) = outgoing {
                            if transport.send(m).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "Session read failed");
                        break;
                    }
                    None => break,
                },
                relayed = recv_group(&mut self.group) => match relayed {
                    Ok(m) => {
                        if transport.send(m).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Session lagged behind its broadcast group");
                    }
                    Err(RecvError::Closed) => {
                        self.group = None;
                    }
                },
            }
        }

        self.finish();
    }

    fn finish(self) {
        let Driver { inner, info, group, .. } = self;
        inner.sessions.remove(&info.id);
        if let Some((key, tx, rx)) = group {
            drop(rx);
            drop(tx);
            inner.groups.remove_if(&key, |_, tx| tx.receiver_count() == 0);
        }
        metrics::session_closed(&info.endpoint);
        tracing::info!(endpoint = %info.endpoint, "Session closed");
    }
}

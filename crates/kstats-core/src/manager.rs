//! Connect/reconnect loop and the per-session dispatch loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

use kstats_types::events::{ChatAction, ChatEvent};
use kstats_types::store::Store;

use crate::handler::MessageHandler;
use crate::registry::ChannelRegistry;
use crate::session::{Connector, Session};

/// Delay between connect attempts. Fixed: no backoff growth, no
/// attempt limit.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Retry policy for the connect loop. The default is the production
/// behavior; tests inject a shorter delay.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: RECONNECT_DELAY,
        }
    }
}

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}

enum SessionEnd {
    Graceful,
    Dropped(String),
}

/// Owns the session lifecycle. Reconnection is strictly sequential: a
/// session is fully torn down before the next connect attempt starts.
pub struct ConnectionManager<C> {
    connector: C,
    store: Arc<dyn Store>,
    registry: ChannelRegistry,
    policy: ReconnectPolicy,
    state: ConnState,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, store: Arc<dyn Store>) -> Self {
        Self {
            connector,
            store,
            registry: ChannelRegistry::new(),
            policy: ReconnectPolicy::default(),
            state: ConnState::Disconnected,
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Blocks for the process lifetime. Connect failures and dropped
    /// sessions are retried forever on the fixed delay; only a graceful
    /// disconnect returns. A persistently rejected credential therefore
    /// loops forever; known design tension, kept as-is.
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            self.state = ConnState::Connecting;
            let session = match self.connector.connect().await {
                Ok(session) => session,
                Err(error) => {
                    warn!(%error, "connect failed, retrying in {:?}", self.policy.delay);
                    self.state = ConnState::Disconnected;
                    sleep(self.policy.delay).await;
                    continue;
                }
            };

            self.state = ConnState::Connected;
            info!(nick = %session.nick, "session connected");
            match self.drive(session).await {
                SessionEnd::Graceful => {
                    info!("session closed cleanly, shutting down");
                    return Ok(());
                }
                SessionEnd::Dropped(reason) => {
                    warn!(reason = %reason, "session dropped, reconnecting in {:?}", self.policy.delay);
                    self.state = ConnState::Disconnected;
                    sleep(self.policy.delay).await;
                }
            }
        }
    }

    /// Dispatch loop for one session. Message handling is spawned per
    /// event: delivery is not assumed serialized, and a slow store call
    /// must block only its own handler, never this loop.
    async fn drive(&mut self, session: Session) -> SessionEnd {
        let Session {
            nick,
            mut events,
            actions,
            roster,
        } = session;
        let handler = Arc::new(MessageHandler::new(
            nick,
            self.registry.clone(),
            self.store.clone(),
            roster,
            actions.clone(),
        ));

        while let Some(event) = events.recv().await {
            match event {
                ChatEvent::SessionEstablished => self.load_and_join(&actions).await,
                ChatEvent::MessageReceived {
                    target,
                    source,
                    text,
                } => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        handler.handle(&target, &source, &text).await;
                    });
                }
                ChatEvent::SessionClosed { error: None } => return SessionEnd::Graceful,
                ChatEvent::SessionClosed {
                    error: Some(reason),
                } => return SessionEnd::Dropped(reason),
            }
        }
        SessionEnd::Dropped("event stream ended".to_string())
    }

    /// Fully replace the channel directory, then request a join for
    /// every entry. Join order is unspecified.
    async fn load_and_join(&self, actions: &mpsc::Sender<ChatAction>) {
        if let Err(error) = self.registry.reload(self.store.as_ref()) {
            warn!(%error, "channel reload failed, keeping previous directory");
            return;
        }
        for name in self.registry.snapshot().keys() {
            info!(channel = %name, "joining");
            let action = ChatAction::Join {
                channel: name.clone(),
            };
            if actions.send(action).await.is_err() {
                return;
            }
        }
    }
}

//! The seam between the core and the chat-protocol collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use kstats_types::events::{ChatAction, ChatEvent};

/// Connecting to the chat network failed. Never fatal: the connection
/// manager retries on a fixed delay.
#[derive(Debug, Error)]
#[error("connect failed: {0}")]
pub struct ConnectError(#[from] pub anyhow::Error);

/// Roster snapshots for the reference detector. `None` means no
/// snapshot is available for that channel, which yields zero
/// references.
pub trait RosterProvider: Send + Sync {
    fn roster(&self, channel: &str) -> Option<Vec<String>>;
}

/// An established chat session: inbound events, outbound actions, and
/// the collaborator-side roster tracking.
pub struct Session {
    /// The nick this session is registered under. Direct messages are
    /// recognized by comparing the message target against it.
    pub nick: String,
    pub events: mpsc::Receiver<ChatEvent>,
    pub actions: mpsc::Sender<ChatAction>,
    pub roster: Arc<dyn RosterProvider>,
}

/// Produces sessions. Everything about framing and transport lives
/// behind this trait.
#[async_trait]
pub trait Connector: Send {
    async fn connect(&mut self) -> Result<Session, ConnectError>;
}

use serde::{Deserialize, Serialize};

/// Events delivered by the chat-protocol collaborator and consumed by
/// the dispatch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChatEvent {
    /// Registration with the network completed; channels can be joined.
    SessionEstablished,

    /// A message arrived. `target` is a channel name or the bot's own
    /// nick (direct message); `source` is the sender's nick.
    MessageReceived {
        target: String,
        source: String,
        text: String,
    },

    /// The session ended. `error: None` is a graceful disconnect; any
    /// other value is a dropped session that will be retried.
    SessionClosed { error: Option<String> },
}

/// Actions issued back to the chat-protocol collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChatAction {
    /// Join a channel by name.
    Join { channel: String },

    /// Send a line of text to a channel or nick.
    Reply { target: String, text: String },
}

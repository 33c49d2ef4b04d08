//! Opt-in/opt-out consent commands over direct messages.
//!
//! Consent entries mark a participant's opt-in for a channel. The
//! message-logging path does not consult them before writing analytics
//! records; whether it should is an open question with the
//! stakeholders, so no gating happens here.

use std::sync::Arc;

use tracing::warn;

use kstats_types::models::ConsentEntry;
use kstats_types::store::Store;

use crate::pseudonym;
use crate::registry::ChannelRegistry;

const REPLY_OPT_IN_OK: &str = "Opt-In successful";
const REPLY_OPT_OUT_OK: &str = "Opt-Out successful";
const REPLY_NOT_FOUND: &str = "Channel not found";
const REPLY_RETRY: &str = "An error has occurred, please try again later";

/// A well-formed consent command.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsentCommand {
    OptIn { channel: String },
    OptOut { channel: String },
}

/// Validation failure: the usage reply to send. No store access is
/// attempted for any of these.
#[derive(Debug, PartialEq, Eq)]
pub enum Usage {
    Generic,
    OptIn,
    OptOut,
}

impl Usage {
    pub fn lines(&self) -> Vec<String> {
        match self {
            Usage::Generic => vec![
                "Usage:".to_string(),
                "OPT-IN [channel]".to_string(),
                "OPT-OUT [channel]".to_string(),
            ],
            Usage::OptIn => vec!["Usage: OPT-IN [channel]".to_string()],
            Usage::OptOut => vec!["Usage: OPT-OUT [channel]".to_string()],
        }
    }
}

/// Tokenize a direct message on whitespace. The command name matches
/// case-insensitively; both commands take exactly one parameter.
pub fn parse(text: &str) -> Result<ConsentCommand, Usage> {
    let mut tokens = text.split_whitespace();
    let Some(command) = tokens.next() else {
        return Err(Usage::Generic);
    };
    let parameters: Vec<&str> = tokens.collect();

    if command.eq_ignore_ascii_case("OPT-IN") {
        match parameters.as_slice() {
            [channel] => Ok(ConsentCommand::OptIn {
                channel: (*channel).to_string(),
            }),
            _ => Err(Usage::OptIn),
        }
    } else if command.eq_ignore_ascii_case("OPT-OUT") {
        match parameters.as_slice() {
            [channel] => Ok(ConsentCommand::OptOut {
                channel: (*channel).to_string(),
            }),
            _ => Err(Usage::OptOut),
        }
    } else {
        Err(Usage::Generic)
    }
}

/// Applies consent commands against the store and produces reply lines.
pub struct ConsentHandler {
    registry: ChannelRegistry,
    store: Arc<dyn Store>,
}

impl ConsentHandler {
    pub fn new(registry: ChannelRegistry, store: Arc<dyn Store>) -> Self {
        Self { registry, store }
    }

    /// Handle one direct message; returns the reply lines for the
    /// sender.
    pub fn handle(&self, sender_nick: &str, text: &str) -> Vec<String> {
        match parse(text) {
            Ok(ConsentCommand::OptIn { channel }) => vec![self.opt_in(sender_nick, &channel)],
            Ok(ConsentCommand::OptOut { channel }) => vec![self.opt_out(sender_nick, &channel)],
            Err(usage) => usage.lines(),
        }
    }

    fn opt_in(&self, nick: &str, channel: &str) -> String {
        let Some(info) = self.registry.snapshot().get(channel).cloned() else {
            return REPLY_NOT_FOUND.to_string();
        };
        let digest = match pseudonym::digest(&info.salt, nick) {
            Ok(digest) => digest,
            Err(error) => {
                warn!(%error, channel, "opt-in digest derivation failed");
                return REPLY_RETRY.to_string();
            }
        };
        let entry = ConsentEntry {
            digest,
            nick: nick.to_string(),
        };
        match self.store.insert_consent(&entry) {
            Ok(()) => REPLY_OPT_IN_OK.to_string(),
            Err(error) => {
                warn!(%error, channel, "opt-in store write failed");
                REPLY_RETRY.to_string()
            }
        }
    }

    fn opt_out(&self, nick: &str, channel: &str) -> String {
        let Some(info) = self.registry.snapshot().get(channel).cloned() else {
            return REPLY_NOT_FOUND.to_string();
        };
        let digest = match pseudonym::digest(&info.salt, nick) {
            Ok(digest) => digest,
            Err(error) => {
                warn!(%error, channel, "opt-out digest derivation failed");
                return REPLY_RETRY.to_string();
            }
        };
        match self.store.delete_consent(&digest) {
            Ok(()) => REPLY_OPT_OUT_OK.to_string(),
            Err(error) => {
                warn!(%error, channel, "opt-out store delete failed");
                REPLY_RETRY.to_string()
            }
        }
    }
}

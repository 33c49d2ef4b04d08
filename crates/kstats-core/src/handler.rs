use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use kstats_types::events::ChatAction;
use kstats_types::models::MessageRecord;
use kstats_types::store::Store;

use crate::classify;
use crate::consent::ConsentHandler;
use crate::pseudonym;
use crate::reference;
use crate::registry::{ChannelInfo, ChannelRegistry};
use crate::session::RosterProvider;
use crate::writer::PersistenceWriter;

/// Routes one inbound message. Channel messages feed the analytics
/// pipeline; direct messages feed the consent subsystem; anything else
/// is ignored.
pub struct MessageHandler {
    nick: String,
    registry: ChannelRegistry,
    writer: PersistenceWriter,
    consent: ConsentHandler,
    roster: Arc<dyn RosterProvider>,
    actions: mpsc::Sender<ChatAction>,
}

impl MessageHandler {
    pub fn new(
        nick: String,
        registry: ChannelRegistry,
        store: Arc<dyn Store>,
        roster: Arc<dyn RosterProvider>,
        actions: mpsc::Sender<ChatAction>,
    ) -> Self {
        Self {
            nick,
            registry: registry.clone(),
            writer: PersistenceWriter::new(store.clone()),
            consent: ConsentHandler::new(registry, store),
            roster,
            actions,
        }
    }

    pub async fn handle(&self, target: &str, source: &str, text: &str) {
        let channels = self.registry.snapshot();
        if let Some(info) = channels.get(target) {
            self.log_channel_message(target, info, source, text);
        } else if target == self.nick {
            for line in self.consent.handle(source, text) {
                let action = ChatAction::Reply {
                    target: source.to_string(),
                    text: line,
                };
                if self.actions.send(action).await.is_err() {
                    return;
                }
            }
        }
    }

    /// The analytics pipeline: digest the sender, classify, detect
    /// references against the roster snapshot, then write the reference
    /// records followed by the message record. All writes are
    /// fire-and-forget. Consent is not consulted on this path.
    fn log_channel_message(&self, name: &str, info: &ChannelInfo, source: &str, text: &str) {
        let now = Utc::now();
        let sender = match pseudonym::digest(&info.salt, source) {
            Ok(digest) => digest,
            Err(error) => {
                warn!(%error, channel = name, "cannot pseudonymize sender, dropping message");
                return;
            }
        };

        let content = text.trim();
        let roster = self.roster.roster(name).unwrap_or_default();
        for record in reference::detect(content, &roster, &info.salt, &sender, info.id, now) {
            self.writer.write_reference(&record);
        }

        let record = MessageRecord {
            time: now,
            channel: info.id,
            sender,
            features: classify::classify(content),
        };
        debug!("{}", record);
        self.writer.write_message(&record);
    }
}

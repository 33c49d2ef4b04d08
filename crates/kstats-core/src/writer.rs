use std::sync::Arc;

use tracing::warn;

use kstats_types::models::{MessageRecord, ReferenceRecord};
use kstats_types::store::Store;

/// Writes message and reference records independently. A failure is
/// logged and swallowed, never propagated into the protocol path, so a
/// storage outage cannot take the session down. No transaction groups a
/// message with its references; partial failure stands as written.
#[derive(Clone)]
pub struct PersistenceWriter {
    store: Arc<dyn Store>,
}

impl PersistenceWriter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn write_message(&self, record: &MessageRecord) {
        if let Err(error) = self.store.insert_message(record) {
            warn!(%error, channel = record.channel, "dropping message record");
        }
    }

    pub fn write_reference(&self, record: &ReferenceRecord) {
        if let Err(error) = self.store.insert_reference(record) {
            warn!(%error, channel = record.channel, "dropping reference record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::Utc;
    use kstats_types::models::{Channel, ConsentEntry, Digest, MessageFeatures};
    use kstats_types::store::StoreError;

    struct BrokenStore;

    impl Store for BrokenStore {
        fn list_channels(&self) -> Result<Vec<Channel>, StoreError> {
            Err(StoreError(anyhow!("store offline")))
        }
        fn insert_consent(&self, _: &ConsentEntry) -> Result<(), StoreError> {
            Err(StoreError(anyhow!("store offline")))
        }
        fn delete_consent(&self, _: &Digest) -> Result<(), StoreError> {
            Err(StoreError(anyhow!("store offline")))
        }
        fn insert_message(&self, _: &MessageRecord) -> Result<(), StoreError> {
            Err(StoreError(anyhow!("store offline")))
        }
        fn insert_reference(&self, _: &ReferenceRecord) -> Result<(), StoreError> {
            Err(StoreError(anyhow!("store offline")))
        }
    }

    #[test]
    fn write_failures_are_swallowed() {
        let writer = PersistenceWriter::new(Arc::new(BrokenStore));
        let digest = Digest::from("ab".repeat(32));

        writer.write_message(&MessageRecord {
            time: Utc::now(),
            channel: 1,
            sender: digest.clone(),
            features: MessageFeatures::default(),
        });
        writer.write_reference(&ReferenceRecord {
            time: Utc::now(),
            channel: 1,
            source: digest.clone(),
            target: digest,
        });
        // nothing to assert: the point is that neither call panics or
        // returns an error
    }
}

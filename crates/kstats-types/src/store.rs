use thiserror::Error;

use crate::models::{Channel, ConsentEntry, Digest, MessageRecord, ReferenceRecord};

/// A store operation failed. Analytics writes log and swallow this;
/// the consent path surfaces it to the requesting user as a retry reply.
#[derive(Debug, Error)]
#[error("store operation failed: {0}")]
pub struct StoreError(#[from] pub anyhow::Error);

/// Contract against the storage collaborator. Every operation may fail;
/// the caller decides whether a failure is surfaced or swallowed.
pub trait Store: Send + Sync {
    /// All channels enrolled for analytics.
    fn list_channels(&self) -> Result<Vec<Channel>, StoreError>;

    /// Insert an opt-in marker, keyed by its digest.
    fn insert_consent(&self, entry: &ConsentEntry) -> Result<(), StoreError>;

    /// Remove the opt-in marker for `digest`, if present.
    fn delete_consent(&self, digest: &Digest) -> Result<(), StoreError>;

    fn insert_message(&self, record: &MessageRecord) -> Result<(), StoreError>;

    fn insert_reference(&self, record: &ReferenceRecord) -> Result<(), StoreError>;
}

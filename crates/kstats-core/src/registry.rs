//! Session-scoped channel directory.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use kstats_types::store::{Store, StoreError};

/// Per-channel data needed by the message path.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: i64,
    pub salt: String,
}

/// Name-keyed channel directory, read-only between reloads.
///
/// Reads take an immutable snapshot; a reload builds a fresh map and
/// swaps it in atomically, so a handler holding a snapshot never
/// observes a partially rebuilt directory. Entries absent from a reload
/// are gone: the mapping is replaced, not merged.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    inner: Arc<RwLock<Arc<HashMap<String, ChannelInfo>>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Cheap, and valid across a concurrent reload.
    pub fn snapshot(&self) -> Arc<HashMap<String, ChannelInfo>> {
        self.inner.read().expect("registry lock poisoned").clone()
    }

    /// Replace the directory with a fresh load from the store. On store
    /// failure the previous mapping is kept.
    pub fn reload(&self, store: &dyn Store) -> Result<usize, StoreError> {
        let channels = store.list_channels()?;
        let mut map = HashMap::with_capacity(channels.len());
        for channel in channels {
            map.insert(
                channel.name,
                ChannelInfo {
                    id: channel.id,
                    salt: channel.salt,
                },
            );
        }
        let count = map.len();
        *self.inner.write().expect("registry lock poisoned") = Arc::new(map);
        info!(channels = count, "channel directory reloaded");
        Ok(count)
    }
}

//! Stream registry implementation
//!
//! Maps stream keys to live hubs. Publishers register and remove hubs;
//! viewers and the query API look them up.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::archive::ArchivedObject;

use super::config::{RegistryConfig, RepublishPolicy};
use super::error::RegistryError;
use super::frame::StreamKey;
use super::hub::StreamHub;

/// Central registry for all live streams
///
/// Thread-safe via `RwLock`. Lookups from viewers and the query API share the
/// read side; only publish start and teardown take the write side.
pub struct StreamRegistry {
    /// Live hubs by key
    streams: RwLock<HashMap<StreamKey, Arc<StreamHub>>>,

    /// Most recent archived object per key, kept after the hub is gone
    archives: RwLock<HashMap<StreamKey, ArchivedObject>>,

    config: RegistryConfig,
}

impl StreamRegistry {
    /// Create a new stream registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new stream registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            archives: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Look up the live hub for a key
    pub async fn get(&self, key: &StreamKey) -> Option<Arc<StreamHub>> {
        self.streams.read().await.get(key).cloned()
    }

    /// Install `hub` under `key`, replacing any existing entry.
    ///
    /// The displaced hub is returned untouched; closing it is the caller's
    /// decision.
    pub async fn set(&self, key: StreamKey, hub: Arc<StreamHub>) -> Option<Arc<StreamHub>> {
        self.streams.write().await.insert(key, hub)
    }

    /// Install `hub` only if no open hub occupies `key`
    pub async fn try_set(&self, key: StreamKey, hub: Arc<StreamHub>) -> Result<(), RegistryError> {
        let mut streams = self.streams.write().await;

        if let Some(existing) = streams.get(&key) {
            if !existing.is_closed() {
                return Err(RegistryError::StreamAlreadyPublishing(key));
            }
        }

        streams.insert(key, hub);
        Ok(())
    }

    /// Register a publisher's hub according to the configured policy.
    ///
    /// With [`RepublishPolicy::Evict`] the displaced hub (if any) is returned.
    /// With [`RepublishPolicy::Reject`] an occupied key is an error.
    pub async fn register(
        &self,
        key: &StreamKey,
        hub: Arc<StreamHub>,
    ) -> Result<Option<Arc<StreamHub>>, RegistryError> {
        match self.config.republish {
            RepublishPolicy::Evict => {
                let previous = self.set(key.clone(), hub).await;
                tracing::info!(
                    stream = %key,
                    replaced = previous.is_some(),
                    "Publisher registered"
                );
                Ok(previous)
            }
            RepublishPolicy::Reject => {
                self.try_set(key.clone(), hub).await?;
                tracing::info!(stream = %key, "Publisher registered");
                Ok(None)
            }
        }
    }

    /// Remove the entry for `key`, whatever hub it holds
    pub async fn delete(&self, key: &StreamKey) -> Option<Arc<StreamHub>> {
        self.streams.write().await.remove(key)
    }

    /// Remove the entry for `key` only if it still holds `hub`.
    ///
    /// A publisher tearing down after being evicted must not remove its
    /// successor.
    pub async fn remove_if_current(&self, key: &StreamKey, hub: &Arc<StreamHub>) -> bool {
        let mut streams = self.streams.write().await;

        match streams.get(key) {
            Some(current) if Arc::ptr_eq(current, hub) => {
                streams.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Keys of all live streams, in arbitrary order
    pub async fn list(&self) -> Vec<StreamKey> {
        self.streams.read().await.keys().cloned().collect()
    }

    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Remember `object` as the latest archive for `key`
    pub async fn record_archive(&self, key: &StreamKey, object: ArchivedObject) {
        self.archives.write().await.insert(key.clone(), object);
    }

    /// Latest archived object for `key`.
    ///
    /// A live hub's own pointer wins over the registry's index.
    pub async fn last_archive(&self, key: &StreamKey) -> Option<ArchivedObject> {
        if let Some(object) = self.get(key).await.and_then(|hub| hub.last_archive()) {
            return Some(object);
        }
        self.archives.read().await.get(key).cloned()
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

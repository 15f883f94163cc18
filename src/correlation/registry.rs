//! Response listener registry.
//!
//! # Responsibilities
//! - Map correlation keys to the listener that consumes the matching responses
//! - Reject a second registration for a key already in use
//! - Resolve refined keys with fallback to the unrefined key
//! - Remove a listener only on behalf of the pipeline that registered it
//!
//! # Design Decisions
//! - DashMap entry API gives per-key atomic insert-if-absent; unrelated keys
//!   never contend on a single lock
//! - The registry is an explicit value shared through `Arc`, not a global
//! - Listeners are disconnected after removal, outside the shard lock

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::correlation::key::CorrelationKey;
use crate::error::{BridgeError, BridgeResult};
use crate::event::Event;

/// Anything that can sit in a registry.
pub trait Listener: Send + Sync {
    /// Release held resources (e.g. close waiting connections). Called once on unregister.
    fn disconnect(&self) {}
}

/// Listener consuming correlated responses.
pub trait ResponseListener: Listener {
    fn deliver(&self, event: Event);
}

/// A listener together with its registration facts.
pub struct RegisteredListener<L: ?Sized> {
    key: CorrelationKey,
    owner: String,
    download_enabled: bool,
    handler: Arc<L>,
}

impl<L: ?Sized> RegisteredListener<L> {
    /// `owner` is the name of the pipeline registering the listener.
    pub fn new(key: CorrelationKey, owner: impl Into<String>, handler: Arc<L>) -> Self {
        Self {
            key,
            owner: owner.into(),
            download_enabled: false,
            handler,
        }
    }

    pub fn with_download(mut self, enabled: bool) -> Self {
        self.download_enabled = enabled;
        self
    }

    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn download_enabled(&self) -> bool {
        self.download_enabled
    }

    pub fn handler(&self) -> &Arc<L> {
        &self.handler
    }
}

impl<L: ?Sized> std::fmt::Debug for RegisteredListener<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredListener")
            .field("key", &self.key)
            .field("owner", &self.owner)
            .field("download_enabled", &self.download_enabled)
            .finish_non_exhaustive()
    }
}

/// Thread-safe registry of response listeners.
pub struct ResponseRegistry<L: ?Sized = dyn ResponseListener> {
    entries: DashMap<CorrelationKey, Arc<RegisteredListener<L>>>,
}

impl<L: ?Sized + Listener> ResponseRegistry<L> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert `listener` under its key.
    ///
    /// Exactly one of any number of concurrent registrations for the same key
    /// succeeds; the others get `DuplicateRegistration` and leave the map untouched.
    pub fn register(&self, listener: RegisteredListener<L>) -> BridgeResult<()> {
        match self.entries.entry(listener.key.clone()) {
            Entry::Occupied(occupied) => Err(BridgeError::DuplicateRegistration {
                key: occupied.key().clone(),
            }),
            Entry::Vacant(vacant) => {
                tracing::debug!(key = %listener.key, owner = %listener.owner, "Listener registered");
                vacant.insert(Arc::new(listener));
                Ok(())
            }
        }
    }

    /// Currently registered listener for exactly `key`.
    pub fn lookup(&self, key: &CorrelationKey) -> Option<Arc<RegisteredListener<L>>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up `(owner_id, refinement)`, then fall back to `owner_id` alone.
    pub fn resolve(
        &self,
        owner_id: &str,
        refinement: Option<&str>,
    ) -> Option<Arc<RegisteredListener<L>>> {
        if let Some(refinement) = refinement {
            if let Some(found) = self.lookup(&CorrelationKey::refined(owner_id, refinement)) {
                return Some(found);
            }
        }
        self.lookup(&CorrelationKey::new(owner_id))
    }

    /// Remove the listener under `key` if `pipeline` owns it.
    ///
    /// Returns whether an entry was removed. Absent keys and foreign owners are
    /// ignored; both happen legitimately while a pipeline is being redeployed.
    pub fn unregister(&self, key: &CorrelationKey, pipeline: &str) -> bool {
        match self.entries.remove_if(key, |_, listener| listener.owner == pipeline) {
            Some((_, listener)) => {
                listener.handler.disconnect();
                tracing::debug!(key = %key, owner = %pipeline, "Listener unregistered");
                true
            }
            None => {
                tracing::debug!(key = %key, requester = %pipeline, "Unregister ignored");
                false
            }
        }
    }

    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: ?Sized + Listener> Default for ResponseRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

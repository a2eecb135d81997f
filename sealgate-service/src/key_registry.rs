//! Thread-safe registry mapping wrap tokens to their symmetric keys.
//!
//! Entries are written when a payload is encrypted and removed after the
//! first successful decrypt. Locks are std primitives so the registry works
//! from synchronous callers and from the deferred worker pool alike.

use crate::error::{ServiceError, ServiceResult};
use sealgate_crypto::SymmetricKey;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Token → key registry shared by clones of the same handle.
#[derive(Clone, Default)]
pub struct KeyRegistry {
    keys: Arc<RwLock<HashMap<String, SymmetricKey>>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `key` under `token`, replacing any previous entry.
    pub fn insert(&self, token: String, key: SymmetricKey) {
        self.write().insert(token, key);
    }

    /// Returns a copy of the key for `token` without removing it.
    pub fn get(&self, token: &str) -> ServiceResult<SymmetricKey> {
        self.read()
            .get(token)
            .cloned()
            .ok_or(ServiceError::KeyNotFound)
    }

    /// Removes the entry for `token`, returning the key if it was present.
    pub fn remove(&self, token: &str) -> Option<SymmetricKey> {
        self.write().remove(token)
    }

    /// Returns whether `token` has a live entry.
    pub fn contains(&self, token: &str) -> bool {
        self.read().contains_key(token)
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if no entries are live.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-updated,
    // so poisoned guards are safe to reuse.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SymmetricKey>> {
        self.keys.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SymmetricKey>> {
        self.keys.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRegistry").field("len", &self.len()).finish()
    }
}

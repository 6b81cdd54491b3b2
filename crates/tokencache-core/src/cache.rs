use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TokenCacheError;

/// Capabilities a store needs from the in-memory cache it keeps in sync.
///
/// The serialized form is opaque to the store: whatever `serialize` returns is
/// encrypted and written as-is, and the decrypted bytes are handed back to
/// `deserialize` unchanged.
pub trait TokenCacheAccess: Send {
    /// Snapshot the whole cache state. An empty blob means "nothing to persist".
    fn serialize(&self) -> Result<Vec<u8>, TokenCacheError>;

    /// Replace the in-memory state. `None` or an empty slice starts empty.
    fn deserialize(&mut self, blob: Option<&[u8]>) -> Result<(), TokenCacheError>;

    /// True when the state changed since the last persisted write.
    fn is_dirty(&self) -> bool;

    fn set_dirty(&mut self, dirty: bool);
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheState {
    entries: BTreeMap<String, String>,
}

/// Key/value token cache serialized as JSON.
///
/// Mutations raise the dirty flag; loading state does not touch it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InMemoryTokenCache {
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
        self.dirty = true;
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TokenCacheAccess for InMemoryTokenCache {
    fn serialize(&self) -> Result<Vec<u8>, TokenCacheError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let state = CacheState {
            entries: self.entries.clone(),
        };
        serde_json::to_vec(&state).map_err(TokenCacheError::serialization)
    }

    fn deserialize(&mut self, blob: Option<&[u8]>) -> Result<(), TokenCacheError> {
        let state = match blob {
            Some(bytes) if !bytes.is_empty() => serde_json::from_slice::<CacheState>(bytes)
                .map_err(TokenCacheError::serialization)?,
            _ => CacheState::default(),
        };
        self.entries = state.entries;
        Ok(())
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutations_mark_dirty() {
        let mut cache = InMemoryTokenCache::new();
        assert!(!cache.is_dirty());

        cache.insert("account/alice", "refresh-token");
        assert!(cache.is_dirty());

        cache.set_dirty(false);
        assert_eq!(cache.remove("missing"), None);
        assert!(!cache.is_dirty(), "removing an absent key is not a change");

        assert_eq!(cache.remove("account/alice").as_deref(), Some("refresh-token"));
        assert!(cache.is_dirty());
    }

    #[test]
    fn serialized_state_reloads_into_fresh_cache() {
        let mut cache = InMemoryTokenCache::new();
        cache.insert("b", "2");
        cache.insert("a", "1");
        let blob = cache.serialize().expect("serialize");

        let mut reloaded = InMemoryTokenCache::new();
        reloaded.deserialize(Some(blob.as_slice())).expect("deserialize");
        assert_eq!(reloaded.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(reloaded.get("a"), Some("1"));
        assert!(!reloaded.is_dirty());
    }

    #[test]
    fn empty_cache_serializes_to_empty_blob() {
        let cache = InMemoryTokenCache::new();
        assert!(cache.serialize().expect("serialize").is_empty());
    }

    #[test]
    fn absent_or_empty_input_starts_empty() {
        let mut cache = InMemoryTokenCache::new();
        cache.insert("k", "v");

        cache.deserialize(None).expect("absent");
        assert!(cache.is_empty());

        cache.insert("k", "v");
        cache.deserialize(Some(&[][..])).expect("empty");
        assert!(cache.is_empty());
    }

    #[test]
    fn garbage_input_is_a_serialization_error() {
        let mut cache = InMemoryTokenCache::new();
        let err = cache
            .deserialize(Some(&b"not json"[..]))
            .expect_err("should reject garbage");
        assert!(matches!(err, TokenCacheError::Serialization { .. }));
    }
}

use crate::error::TokenCacheError;

/// Notifications bracketing every access to an in-memory token cache.
///
/// Callers invoke `on_before_access` right before reading the cache and
/// `on_after_access` right after any access that may have mutated it.
/// Implementations keep the cache consistent with its persisted copy.
pub trait CacheAccessHooks {
    /// Reload the in-memory cache from the persisted state.
    fn on_before_access(&self) -> Result<(), TokenCacheError>;

    /// Persist the in-memory cache if it changed since the last write.
    fn on_after_access(&self) -> Result<(), TokenCacheError>;
}

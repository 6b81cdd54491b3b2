use std::path::{Path, PathBuf};

use color_eyre::Result;
use dirs::data_dir;
use tokencache_core::InMemoryTokenCache;
#[cfg(test)]
use tokencache_storage::InMemoryKeyProvider;
use tokencache_storage::{
    EncryptedFileTokenStore, KeyProvider, KeyringProvider, UserScopedProtector,
};
use tracing::debug;

use crate::config::Config;

pub const DEFAULT_KEYRING_SERVICE: &str = "tokencache";

pub type TokenStore<P> = EncryptedFileTokenStore<InMemoryTokenCache, UserScopedProtector<P>>;

/// Resolve the default cache file location.
pub fn default_cache_file() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("tokencache").join("token.cache"))
}

pub fn cache_file(config: &Config) -> Result<PathBuf> {
    match &config.cache_file {
        Some(path) => Ok(path.clone()),
        None => default_cache_file(),
    }
}

/// Key provider backed by the OS keyring, honoring config overrides.
pub fn key_provider(config: &Config) -> KeyringProvider {
    let service = config
        .keyring_service
        .clone()
        .unwrap_or_else(|| DEFAULT_KEYRING_SERVICE.to_string());
    match &config.keyring_account {
        Some(account) => KeyringProvider::new(service, account.clone()),
        None => KeyringProvider::for_current_user(service),
    }
}

/// Open the configured cache file with the OS keyring key.
pub fn store_from_config(config: &Config) -> Result<TokenStore<KeyringProvider>> {
    let path = cache_file(config)?;
    debug!(?path, "opening encrypted token cache");
    open_store(path, key_provider(config))
}

pub fn open_store<P: KeyProvider>(
    path: impl AsRef<Path>,
    key_provider: P,
) -> Result<TokenStore<P>> {
    Ok(EncryptedFileTokenStore::open(
        path.as_ref(),
        InMemoryTokenCache::new(),
        UserScopedProtector::new(key_provider),
    )?)
}

/// Helper for tests to open a store with an in-memory key.
#[cfg(test)]
pub fn test_store(
    path: impl AsRef<Path>,
    keys: &InMemoryKeyProvider,
) -> TokenStore<InMemoryKeyProvider> {
    open_store(path, keys.clone()).expect("open test store")
}

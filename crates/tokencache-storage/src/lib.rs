//! Encrypted file-backed token cache storage.
//! Uses AES-GCM with keys sourced from the OS keyring (or test doubles).

pub mod file_token_store;
pub mod key_provider;
pub mod protector;

pub use file_token_store::{EncryptedFileTokenStore, StoreState};
pub use key_provider::{InMemoryKeyProvider, KeyProvider, KeyringProvider};
pub use protector::UserScopedProtector;

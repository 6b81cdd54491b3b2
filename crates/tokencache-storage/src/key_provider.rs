use std::sync::{Arc, Mutex, MutexGuard};

use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use tracing::debug;

/// Key material used for encryption at rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// 256-bit symmetric key.
    pub bytes: [u8; 32],
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("generation error: {0}")]
    Generation(String),
}

/// Provides the current principal's cache key (OS keychain in production; memory in tests).
pub trait KeyProvider: Send + Sync {
    /// The stored key, if any. Never creates one.
    fn get(&self) -> Result<Option<KeyMaterial>, KeyError>;

    fn get_or_create(&self) -> Result<KeyMaterial, KeyError>;
}

/// OS keyring-backed provider. The entry lives in the keyring of the user
/// running the process, so only that user can read it back.
pub struct KeyringProvider {
    service: String,
    account: String,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    /// Provider whose keyring account is the current OS user name.
    pub fn for_current_user(service: impl Into<String>) -> Self {
        Self::new(service, whoami::username())
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    fn entry(&self) -> Result<keyring::Entry, KeyError> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| KeyError::Keyring(e.to_string()))
    }
}

impl KeyProvider for KeyringProvider {
    fn get(&self) -> Result<Option<KeyMaterial>, KeyError> {
        match self.entry()?.get_password() {
            Ok(secret) => decode_key(&secret).map(Some),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(KeyError::Keyring(err.to_string())),
        }
    }

    fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        if let Some(existing) = self.get()? {
            return Ok(existing);
        }

        debug!(service = %self.service, "creating cache key in OS keyring");
        let material = generate_key();
        self.entry()?
            .set_password(&encode_key(&material))
            .map_err(|e| KeyError::Keyring(e.to_string()))?;
        Ok(material)
    }
}

/// In-memory key provider for tests and ephemeral sessions.
///
/// Clones share one key; separately constructed providers behave like
/// different principals.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<KeyMaterial>>>,
}

impl InMemoryKeyProvider {
    fn slot(&self) -> Result<MutexGuard<'_, Option<KeyMaterial>>, KeyError> {
        self.inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))
    }
}

impl KeyProvider for InMemoryKeyProvider {
    fn get(&self) -> Result<Option<KeyMaterial>, KeyError> {
        Ok(self.slot()?.clone())
    }

    fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        let mut guard = self.slot()?;

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let material = generate_key();
        *guard = Some(material.clone());
        Ok(material)
    }
}

fn generate_key() -> KeyMaterial {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    KeyMaterial { bytes }
}

fn encode_key(material: &KeyMaterial) -> String {
    general_purpose::STANDARD.encode(material.bytes)
}

fn decode_key(secret: &str) -> Result<KeyMaterial, KeyError> {
    let bytes = general_purpose::STANDARD
        .decode(secret)
        .map_err(|e| KeyError::Decode(e.to_string()))?;

    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| KeyError::Decode(format!("expected 32 bytes, got {}", b.len())))?;

    Ok(KeyMaterial { bytes })
}

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use tokencache_core::{DataProtector, TokenCacheError};

use crate::key_provider::{KeyError, KeyMaterial, KeyProvider};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// AES-256-GCM protector keyed by the current principal's key material.
///
/// Output layout is `nonce || ciphertext || tag` with no header. The GCM tag
/// makes a foreign key or a flipped bit fail decryption instead of yielding
/// garbage.
pub struct UserScopedProtector<P: KeyProvider> {
    key_provider: P,
}

impl<P: KeyProvider> UserScopedProtector<P> {
    pub fn new(key_provider: P) -> Self {
        Self { key_provider }
    }

    fn sealing_cipher(&self) -> Result<Aes256Gcm, TokenCacheError> {
        let material = self.key_provider.get_or_create().map_err(key_err)?;
        build_cipher(&material)
    }

    // Opening never mints a key: a fresh key could not decrypt the blob anyway,
    // and it would replace the one that can.
    fn opening_cipher(&self) -> Result<Aes256Gcm, TokenCacheError> {
        match self.key_provider.get().map_err(key_err)? {
            Some(material) => build_cipher(&material),
            None => Err(TokenCacheError::Decryption {
                reason: "no cache key stored for the current user".to_string(),
            }),
        }
    }
}

impl<P: KeyProvider> DataProtector for UserScopedProtector<P> {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, TokenCacheError> {
        let cipher = self.sealing_cipher()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext =
            cipher
                .encrypt(&nonce, plaintext)
                .map_err(|e| TokenCacheError::Encryption {
                    reason: e.to_string(),
                })?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, protected: &[u8]) -> Result<Vec<u8>, TokenCacheError> {
        if protected.len() < NONCE_LEN + TAG_LEN {
            return Err(TokenCacheError::Decryption {
                reason: format!("blob too short ({} bytes)", protected.len()),
            });
        }
        let cipher = self.opening_cipher()?;
        let (nonce, ciphertext) = protected.split_at(NONCE_LEN);
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| TokenCacheError::Decryption {
                reason: "authentication tag mismatch (wrong user key or corrupted file)"
                    .to_string(),
            })
    }
}

fn key_err(err: KeyError) -> TokenCacheError {
    TokenCacheError::KeyProvider {
        reason: err.to_string(),
    }
}

fn build_cipher(material: &KeyMaterial) -> Result<Aes256Gcm, TokenCacheError> {
    Aes256Gcm::new_from_slice(&material.bytes).map_err(|e| TokenCacheError::KeyProvider {
        reason: format!("cipher init failed: {e}"),
    })
}

use crate::error::TokenCacheError;

/// Reversible encryption scoped to the current user principal.
///
/// Key material is never supplied by the caller; implementations derive or
/// load it from the platform (OS keyring, DPAPI, keychain). Decrypting bytes
/// protected by another principal, or corrupted bytes, must fail with
/// [`TokenCacheError::Decryption`].
pub trait DataProtector: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, TokenCacheError>;

    fn decrypt(&self, protected: &[u8]) -> Result<Vec<u8>, TokenCacheError>;
}

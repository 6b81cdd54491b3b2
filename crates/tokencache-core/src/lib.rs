//! Core contracts for the encrypted token cache: the consumer contract, the
//! access notifications, the encryption-provider seam and the error taxonomy.
//! Concrete file and crypto backends live in `tokencache-storage`.

pub mod cache;
pub mod error;
pub mod hooks;
pub mod protection;

pub use cache::{InMemoryTokenCache, TokenCacheAccess};
pub use error::TokenCacheError;
pub use hooks::CacheAccessHooks;
pub use protection::DataProtector;

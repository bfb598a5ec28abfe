//! Secret storage and OAuth credential lifecycle for Switchyard.
//!
//! # Main types
//!
//! - [`SecretStore`] — Opaque key/value storage for credential material.
//! - [`MemorySecretStore`] / [`FileSecretStore`] — In-process and on-disk stores.
//! - [`OAuthCredential`] — Access/refresh token pair with absolute expiry.
//! - [`TokenManager`] — Hands out fresh access tokens, refreshing on demand.
//! - [`TokenRefresher`] — Provider-specific refresh function.
//! - [`OAuthRefresher`] — `refresh_token` grant over HTTP.

/// Stored OAuth credential records.
pub mod credential;
/// Credential lifecycle manager.
pub mod manager;
/// HTTP refresh-token grant.
pub mod refresher;
/// Secret stores.
pub mod store;

pub use credential::{OAuthCredential, TokenEntry, DEFAULT_EXPIRES_IN_SECS};
pub use manager::{token_key, TokenManager, TokenRefresher, REFRESH_BUFFER_SECS};
pub use refresher::OAuthRefresher;
pub use store::{FileSecretStore, MemorySecretStore, SecretStore};

//! Client-side OAuth2/OIDC token cache
//!
//! Durably caches the current token set behind a pluggable key-value
//! [`FieldStore`] and exposes it as a reactive, concurrency-safe source of
//! truth. Each of the six persisted fields is an independently hydrated
//! [`ObservableCell`]; all reads and writes go through one async lock.
//!
//! Storage faults never reach the caller. A read that hits a faulting store
//! yields "absent", which login logic downstream treats as "not logged in".
//!
//! Typical flow:
//! 1. Token exchange produces a [`TokenExchangeResponse`]
//! 2. [`save_response`] persists it and returns a [`CredentialRecord`]
//! 3. Consumers call [`get_tokens`] or watch [`tokens_watch`]
//! 4. Logout calls [`remove_tokens`]

pub mod cache;
pub mod cell;
pub mod error;
pub mod field;
pub mod file_store;
pub mod helpers;
pub mod record;
pub mod store;

pub use cache::{StoredTokenCache, TokenCache};
pub use cell::ObservableCell;
pub use error::{Result, StoreError};
pub use field::{NumberField, TextField, TokenField};
pub use file_store::JsonFileFieldStore;
pub use helpers::{
    TokensWatch, access_token, expires_in, get_tokens, id_token, received_at, refresh_expires_in,
    refresh_token, remove_tokens, save_response, tokens_watch,
};
pub use record::{CredentialRecord, TokenExchangeResponse};
pub use store::{FieldStore, MemoryFieldStore, StoreFuture};

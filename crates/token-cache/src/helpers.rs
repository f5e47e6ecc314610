//! Aggregate operations built on [`TokenCache`]

use tokio::sync::watch;

use crate::cache::TokenCache;
use crate::field::{NumberField, TextField, TokenField};
use crate::record::{CredentialRecord, TokenExchangeResponse};

pub async fn access_token(cache: &dyn TokenCache) -> Option<String> {
    cache.get_text(TextField::AccessToken).await
}

pub async fn refresh_token(cache: &dyn TokenCache) -> Option<String> {
    cache.get_text(TextField::RefreshToken).await
}

pub async fn id_token(cache: &dyn TokenCache) -> Option<String> {
    cache.get_text(TextField::IdToken).await
}

pub async fn expires_in(cache: &dyn TokenCache) -> Option<i64> {
    cache.get_number(NumberField::ExpiresIn).await
}

pub async fn refresh_expires_in(cache: &dyn TokenCache) -> Option<i64> {
    cache.get_number(NumberField::RefreshExpiresIn).await
}

pub async fn received_at(cache: &dyn TokenCache) -> Option<i64> {
    cache.get_number(NumberField::ReceivedAt).await
}

/// The cached token set as one record. `None` when there is no access token.
///
/// Read through [`TokenCache::snapshot`], so a concurrent save is seen either
/// entirely or not at all.
pub async fn get_tokens(cache: &dyn TokenCache) -> Option<CredentialRecord> {
    cache.snapshot().await
}

/// Persist a token endpoint response and return it as a record.
pub async fn save_response(
    cache: &dyn TokenCache,
    response: TokenExchangeResponse,
) -> CredentialRecord {
    let record = CredentialRecord::from(response);
    cache.save_tokens(&record).await;
    record
}

/// Remove every field. Each removal is its own critical section, so an
/// interrupted logout can be finished by calling this again.
pub async fn remove_tokens(cache: &dyn TokenCache) {
    for field in TokenField::ALL {
        cache.remove(field).await;
    }
}

/// Subscription to the whole token set.
pub async fn tokens_watch(cache: &dyn TokenCache) -> TokensWatch {
    TokensWatch {
        tokens: cache.watch_tokens().await,
    }
}

/// Reactive view over the whole token set.
///
/// [`TokensWatch::current`] always reflects the latest published set;
/// [`TokensWatch::changed`] resolves once per save or removal, never halfway
/// through one.
#[derive(Clone)]
pub struct TokensWatch {
    tokens: watch::Receiver<Option<CredentialRecord>>,
}

impl TokensWatch {
    /// Latest token set, or `None` when there is no access token.
    pub fn current(&mut self) -> Option<CredentialRecord> {
        self.tokens.borrow_and_update().clone()
    }

    /// Wait until the token set changes, then return it.
    ///
    /// Returns `Err` once the cache that owns the fields has been dropped.
    pub async fn changed(&mut self) -> Result<Option<CredentialRecord>, watch::error::RecvError> {
        self.tokens.changed().await?;
        Ok(self.current())
    }
}

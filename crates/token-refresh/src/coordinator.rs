//! Refresh coordinator
//!
//! One tokio Mutex guards all refresh logic. It is separate from the token
//! cache's internal lock; the only nesting is coordinator lock → cache lock
//! (during the bulk save), never the reverse.
//!
//! De-duplication compares the access token the caller last saw against the
//! cached one. If they differ, someone refreshed in between and the cached
//! record is returned as-is. This assumes access tokens are never reissued
//! with the same value.

use std::future::Future;
use std::sync::Arc;

use token_cache::record::DEFAULT_MIN_VALIDITY_SECS;
use token_cache::{CredentialRecord, TokenCache, TokenExchangeResponse};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::metrics::{RefreshOutcome, record_refresh};

pub struct RefreshCoordinator {
    cache: Arc<dyn TokenCache>,
    lock: Mutex<()>,
}

impl RefreshCoordinator {
    pub fn new(cache: Arc<dyn TokenCache>) -> Self {
        Self {
            cache,
            lock: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<dyn TokenCache> {
        &self.cache
    }

    /// Refresh the cached tokens unless another caller already replaced
    /// `old_access_token`.
    ///
    /// Two concurrent callers holding the same stale token produce exactly
    /// one call to `refresh`; the second waits on the lock and then returns
    /// the record the first one saved.
    pub async fn refresh_and_save<F, Fut, E>(
        &self,
        refresh: F,
        old_access_token: &str,
    ) -> Result<CredentialRecord, Error<E>>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<TokenExchangeResponse, E>>,
        E: std::fmt::Display,
    {
        let _guard = self.lock.lock().await;

        let current = token_cache::get_tokens(self.cache.as_ref())
            .await
            .ok_or(Error::NoCredentials)?;

        if current.access_token() != old_access_token {
            debug!("access token already replaced by another caller, skipping refresh");
            record_refresh(RefreshOutcome::Deduplicated);
            return Ok(current);
        }

        self.refresh_locked(refresh, &current)
            .await
            .map_err(Error::Refresh)
    }

    /// Run `action` with tokens valid for at least the default five minutes.
    pub async fn perform_with_fresh_tokens<F, Fut, E, A, AFut, T>(
        &self,
        refresh: F,
        action: A,
    ) -> Result<T, Error<E>>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<TokenExchangeResponse, E>>,
        E: std::fmt::Display,
        A: FnOnce(CredentialRecord) -> AFut,
        AFut: Future<Output = T>,
    {
        self.perform_with_fresh_tokens_within(DEFAULT_MIN_VALIDITY_SECS, refresh, action)
            .await
    }

    /// Run `action` with tokens that stay valid for at least
    /// `min_validity_secs`, refreshing first if needed.
    ///
    /// The lock is released before `action` runs, so a slow action never
    /// blocks other refreshes.
    pub async fn perform_with_fresh_tokens_within<F, Fut, E, A, AFut, T>(
        &self,
        min_validity_secs: i64,
        refresh: F,
        action: A,
    ) -> Result<T, Error<E>>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<TokenExchangeResponse, E>>,
        E: std::fmt::Display,
        A: FnOnce(CredentialRecord) -> AFut,
        AFut: Future<Output = T>,
    {
        let tokens = {
            let _guard = self.lock.lock().await;
            let current = token_cache::get_tokens(self.cache.as_ref())
                .await
                .ok_or(Error::NoCredentials)?;

            if current.refresh_needed(min_validity_secs) {
                debug!(min_validity_secs, "access token near expiry, refreshing before use");
                self.refresh_locked(refresh, &current)
                    .await
                    .map_err(Error::Refresh)?
            } else {
                current
            }
        };

        Ok(action(tokens).await)
    }

    /// Call `refresh` with the refresh token from `current` and save the result.
    /// Caller must hold `self.lock`.
    async fn refresh_locked<F, Fut, E>(
        &self,
        refresh: F,
        current: &CredentialRecord,
    ) -> Result<CredentialRecord, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<TokenExchangeResponse, E>>,
        E: std::fmt::Display,
    {
        let previous = current.refresh_token().map(str::to_owned);
        if previous.is_none() {
            debug!("no refresh token cached, refresh operation will likely fail");
        }

        let mut response = match refresh(previous.clone().unwrap_or_default()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                record_refresh(RefreshOutcome::Failure);
                return Err(e);
            }
        };

        // Providers often omit an unchanged refresh token
        if response.refresh_token.is_none() {
            response.refresh_token = previous;
        }

        let record = token_cache::save_response(self.cache.as_ref(), response).await;
        info!(expires_in = ?record.expires_in(), "token refresh succeeded");
        record_refresh(RefreshOutcome::Success);
        Ok(record)
    }
}

//! Credential records and token endpoint responses
//!
//! A [`CredentialRecord`] is an immutable snapshot of one token set. Validity
//! is always derived from `received_at` plus the relative lifetimes; it is
//! never stored. A successful refresh produces a new record rather than
//! mutating the old one.

use std::fmt;

use common::now_epoch_secs;
use serde::{Deserialize, Serialize};

/// Default proactive refresh window: refresh when the access token has less
/// than five minutes left.
pub const DEFAULT_MIN_VALIDITY_SECS: i64 = 300;

/// Token set as returned by an authorization-code or refresh-token exchange.
///
/// `expires_in` and `refresh_expires_in` are deltas in seconds from
/// `received_at`. The wire format has no `received_at`; it is filled with the
/// time the response was deserialized.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<i64>,
    #[serde(default = "now_epoch_secs")]
    pub received_at: i64,
}

impl TokenExchangeResponse {
    /// Response carrying only an access token, received now.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            id_token: None,
            expires_in: None,
            refresh_expires_in: None,
            received_at: now_epoch_secs(),
        }
    }
}

impl fmt::Debug for TokenExchangeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenExchangeResponse")
            .field("access_token", &Redacted)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| Redacted))
            .field("id_token", &self.id_token.as_ref().map(|_| Redacted))
            .field("expires_in", &self.expires_in)
            .field("refresh_expires_in", &self.refresh_expires_in)
            .field("received_at", &self.received_at)
            .finish()
    }
}

/// Immutable snapshot of the current token set.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    access_token: String,
    refresh_token: Option<String>,
    id_token: Option<String>,
    expires_in: Option<i64>,
    refresh_expires_in: Option<i64>,
    received_at: i64,
}

impl CredentialRecord {
    /// Rebuild a record from persisted fields. A missing `received_at`
    /// defaults to now.
    pub fn from_fields(
        access_token: String,
        refresh_token: Option<String>,
        id_token: Option<String>,
        expires_in: Option<i64>,
        refresh_expires_in: Option<i64>,
        received_at: Option<i64>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            id_token,
            expires_in,
            refresh_expires_in,
            received_at: received_at.unwrap_or_else(now_epoch_secs),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    pub fn expires_in(&self) -> Option<i64> {
        self.expires_in
    }

    pub fn refresh_expires_in(&self) -> Option<i64> {
        self.refresh_expires_in
    }

    pub fn received_at(&self) -> i64 {
        self.received_at
    }

    /// Absolute expiry of the access token, if known.
    pub fn access_expires_at(&self) -> Option<i64> {
        self.expires_in
            .map(|delta| self.received_at.saturating_add(delta))
    }

    /// Absolute expiry of the refresh token, if known.
    pub fn refresh_expires_at(&self) -> Option<i64> {
        self.refresh_expires_in
            .map(|delta| self.received_at.saturating_add(delta))
    }

    pub fn access_token_valid(&self) -> bool {
        self.access_token_valid_at(now_epoch_secs())
    }

    /// True iff `expires_in` is known and `received_at + expires_in > now`.
    pub fn access_token_valid_at(&self, now: i64) -> bool {
        self.access_expires_at().is_some_and(|at| at > now)
    }

    pub fn refresh_token_valid(&self) -> bool {
        self.refresh_token_valid_at(now_epoch_secs())
    }

    /// True iff a refresh token and its lifetime are both known and
    /// `received_at + refresh_expires_in > now`.
    pub fn refresh_token_valid_at(&self, now: i64) -> bool {
        self.refresh_token.is_some() && self.refresh_expires_at().is_some_and(|at| at > now)
    }

    pub fn refresh_needed(&self, min_validity_secs: i64) -> bool {
        self.refresh_needed_at(min_validity_secs, now_epoch_secs())
    }

    /// True when the access token expires within `min_validity_secs` of `now`.
    /// An unknown lifetime always needs a refresh.
    pub fn refresh_needed_at(&self, min_validity_secs: i64, now: i64) -> bool {
        match self.access_expires_at() {
            Some(at) => at <= now.saturating_add(min_validity_secs),
            None => true,
        }
    }
}

impl From<TokenExchangeResponse> for CredentialRecord {
    fn from(response: TokenExchangeResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            id_token: response.id_token,
            expires_in: response.expires_in,
            refresh_expires_in: response.refresh_expires_in,
            received_at: response.received_at,
        }
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_token", &Redacted)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| Redacted))
            .field("id_token", &self.id_token.as_ref().map(|_| Redacted))
            .field("expires_in", &self.expires_in)
            .field("refresh_expires_in", &self.refresh_expires_in)
            .field("received_at", &self.received_at)
            .finish()
    }
}

struct Redacted;

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

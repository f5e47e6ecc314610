//! OAuth token endpoint client
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (completes a browser login, with PKCE)
//! 2. Token refresh (request-time and background)
//!
//! Both POST a form to the provider's token endpoint with different grant types.

use common::Secret;
use serde::Deserialize;
use token_cache::TokenExchangeResponse;

use crate::error::EndpointError;
use crate::refresher::{RefreshFuture, Refresher};

/// OAuth error body (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for one provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Option<Secret<String>>,
    redirect_uri: String,
}

impl TokenEndpoint {
    pub fn new(
        client: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Authenticate as a confidential client.
    pub fn with_client_secret(mut self, secret: Secret<String>) -> Self {
        self.client_secret = Some(secret);
        self
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Exchange an authorization code for tokens.
    ///
    /// `verifier` is the PKCE code verifier generated when the authorization
    /// URL was built.
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<TokenExchangeResponse, EndpointError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.expose().as_str()));
        }
        self.post(&form, "token exchange").await
    }

    /// Exchange a refresh token for a new token set.
    pub async fn refresh_token(&self, refresh: &str) -> Result<TokenExchangeResponse, EndpointError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.expose().as_str()));
        }
        self.post(&form, "token refresh").await
    }

    async fn post(
        &self,
        form: &[(&str, &str)],
        what: &str,
    ) -> Result<TokenExchangeResponse, EndpointError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| EndpointError::Http(format!("{what} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            if is_rejected_grant(status.as_u16(), &body) {
                return Err(EndpointError::InvalidGrant(format!(
                    "{what} rejected ({status}): {body}"
                )));
            }

            return Err(EndpointError::TokenExchange(format!(
                "{what} returned {status}: {body}"
            )));
        }

        response
            .json::<TokenExchangeResponse>()
            .await
            .map_err(|e| EndpointError::TokenExchange(format!("invalid {what} response: {e}")))
    }
}

/// 401/403, or a 400 whose OAuth error code is `invalid_grant`, means the
/// grant is dead and retrying will not help.
fn is_rejected_grant(status: u16, body: &str) -> bool {
    match status {
        401 | 403 => true,
        400 => serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error == "invalid_grant")
            .unwrap_or(false),
        _ => false,
    }
}

impl Refresher for TokenEndpoint {
    type Error = EndpointError;

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> RefreshFuture<'a, EndpointError> {
        Box::pin(self.refresh_token(refresh_token))
    }
}

//! PKCE (Proof Key for Code Exchange) per RFC 7636 and authorization URLs
//!
//! The verifier stays with the client and is sent during the code exchange;
//! the S256 challenge goes into the authorization URL so the provider can tie
//! the exchange to the party that started the flow. `state` guards the
//! callback against CSRF.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::RedirectError;
use crate::interpreter::AuthorizationCode;
use crate::launcher::{EmbeddedBrowser, LaunchRequest};

/// Generate a random PKCE code verifier: 64 random bytes as URL-safe
/// base64 without padding (86 characters, inside RFC 7636's 43-128).
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Opaque random value echoed back by the provider in the callback.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Static description of how to start a login with one provider.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorization_endpoint: String,
    pub client_id: String,
    pub redirect_uri: String,
    /// Space-separated scopes, e.g. `openid profile offline_access`.
    pub scopes: String,
}

impl AuthorizationRequest {
    /// Full authorization URL with all required OAuth parameters.
    pub fn build_url(&self, state: &str, challenge: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.authorization_endpoint)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes)
            .append_pair("code_challenge", challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", state);
        Ok(url)
    }

    /// Start an attempt with a fresh verifier and state.
    pub fn start(&self) -> Result<PendingAuthorization, url::ParseError> {
        let verifier = generate_verifier();
        let state = generate_state();
        let url = self.build_url(&state, &compute_challenge(&verifier))?;
        Ok(PendingAuthorization {
            url,
            state,
            verifier,
        })
    }
}

/// An authorization attempt waiting for its redirect.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub url: Url,
    pub state: String,
    /// PKCE verifier to send with the code exchange.
    pub verifier: String,
}

impl PendingAuthorization {
    pub fn launch_request(&self, embedded: Option<EmbeddedBrowser>) -> LaunchRequest {
        LaunchRequest {
            url: self.url.to_string(),
            embedded,
        }
    }

    /// Reject a code whose `state` does not match this attempt.
    pub fn verify(&self, code: AuthorizationCode) -> Result<AuthorizationCode, RedirectError> {
        match code.state.as_deref() {
            Some(state) if state == self.state => Ok(code),
            Some(_) => Err(RedirectError::AuthenticationFailure(
                "state mismatch in authorization callback".into(),
            )),
            None => Err(RedirectError::AuthenticationFailure(
                "authorization callback is missing state".into(),
            )),
        }
    }
}

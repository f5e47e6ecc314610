//! Browser-delegated authorization for the authorization-code flow
//!
//! Builds the PKCE-protected authorization URL, hands it to a host-provided
//! [`RedirectLauncher`] (system browser, embedded web view, or a pasted
//! callback URL), and interprets the redirect that comes back.
//!
//! Flow:
//! 1. `AuthorizationRequest::start()` → [`PendingAuthorization`] (URL, state, verifier)
//! 2. [`authorize`] launches the URL and interprets the [`RedirectOutcome`]
//! 3. `PendingAuthorization::verify()` checks `state` and yields the code
//! 4. The caller exchanges the code at the token endpoint
//!
//! Each attempt is one-shot: there are no retries at this layer.

pub mod error;
pub mod interpreter;
pub mod launcher;
pub mod pkce;

pub use error::RedirectError;
pub use interpreter::{AttemptState, AuthFailure, AuthorizationCode, interpret};
pub use launcher::{
    EmbeddedBrowser, LaunchRequest, RedirectLauncher, RedirectOutcome, ResultCode, authorize,
};
pub use pkce::{
    AuthorizationRequest, PendingAuthorization, compute_challenge, generate_state,
    generate_verifier,
};

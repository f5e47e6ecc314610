//! Redirect launcher interface
//!
//! The host application owns the browser: it opens the authorization URL and
//! reports back how the redirect ended. This crate only consumes the result.

use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::interpreter::AttemptState;

/// How the browser or web view finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// The flow reached the redirect URI.
    Ok,
    /// The user dismissed the browser first.
    Canceled,
}

/// Raw result of a browser redirect, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectOutcome {
    pub result_code: ResultCode,
    pub callback_uri: Option<String>,
}

impl RedirectOutcome {
    pub fn completed(callback_uri: impl Into<String>) -> Self {
        Self {
            result_code: ResultCode::Ok,
            callback_uri: Some(callback_uri.into()),
        }
    }

    pub fn canceled() -> Self {
        Self {
            result_code: ResultCode::Canceled,
            callback_uri: None,
        }
    }
}

/// Embedded web view settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedBrowser {
    /// Redirect URI the web view intercepts instead of following.
    pub redirect_uri: String,
    /// Run without shared cookies so a previous login is not reused.
    pub ephemeral_session: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub url: String,
    /// `None` launches the system browser.
    pub embedded: Option<EmbeddedBrowser>,
}

/// Opens an authorization URL and waits for the redirect.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility.
pub trait RedirectLauncher: Send + Sync {
    fn launch<'a>(
        &'a self,
        request: &'a LaunchRequest,
    ) -> Pin<Box<dyn Future<Output = RedirectOutcome> + Send + 'a>>;
}

/// Run one authorization attempt: launch, then interpret the outcome.
pub async fn authorize(launcher: &dyn RedirectLauncher, request: &LaunchRequest) -> AttemptState {
    debug!(embedded = request.embedded.is_some(), "launching authorization redirect");
    let outcome = launcher.launch(request).await;
    AttemptState::Started.complete(&outcome)
}

//! Redirect result interpreter
//!
//! Pure state machine for one authorization attempt:
//!
//! - Started → Cancelled (browser dismissed)
//! - Started → Failed(NoRedirectUri) (flow finished without a callback)
//! - Started → Failed(Provider) (callback carries `error=`)
//! - Started → Succeeded(code, state)
//!
//! Terminal states ignore further outcomes.

use tracing::{debug, warn};
use url::Url;

use crate::error::RedirectError;
use crate::launcher::{RedirectOutcome, ResultCode};

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// The provider redirected with an `error` parameter.
    Provider {
        error: String,
        description: Option<String>,
    },
    /// The browser reported success but no callback URI arrived.
    NoRedirectUri,
    /// The callback URI could not be parsed.
    MalformedRedirectUri(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    Started,
    /// Either parameter may be missing; callers decide whether that is fatal.
    Succeeded {
        code: Option<String>,
        state: Option<String>,
    },
    Failed(AuthFailure),
    Cancelled,
}

/// Authorization code plus the `state` it came back with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub state: Option<String>,
}

impl AttemptState {
    /// Apply the redirect outcome. Only `Started` transitions.
    pub fn complete(self, outcome: &RedirectOutcome) -> AttemptState {
        match self {
            AttemptState::Started => interpret(outcome),
            finished => {
                warn!(state = ?finished, "redirect outcome for a finished attempt, ignoring");
                finished
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptState::Started)
    }

    /// Convert a terminal state into the code or a typed failure.
    pub fn into_result(self) -> Result<AuthorizationCode, RedirectError> {
        match self {
            AttemptState::Succeeded {
                code: Some(code),
                state,
            } => Ok(AuthorizationCode { code, state }),
            AttemptState::Succeeded { code: None, .. } => Err(RedirectError::AuthenticationFailure(
                "callback carried no authorization code".into(),
            )),
            AttemptState::Failed(AuthFailure::Provider { error, description }) => {
                let message = match description {
                    Some(description) => format!("{error}: {description}"),
                    None => error,
                };
                Err(RedirectError::AuthenticationFailure(message))
            }
            AttemptState::Failed(AuthFailure::NoRedirectUri) => Err(
                RedirectError::AuthenticationFailure("no redirect URI received".into()),
            ),
            AttemptState::Failed(AuthFailure::MalformedRedirectUri(reason)) => Err(
                RedirectError::AuthenticationFailure(format!("malformed redirect URI: {reason}")),
            ),
            AttemptState::Cancelled => Err(RedirectError::Cancelled),
            AttemptState::Started => Err(RedirectError::AuthenticationFailure(
                "authorization attempt has not completed".into(),
            )),
        }
    }
}

/// Map a redirect outcome to the attempt's terminal state.
pub fn interpret(outcome: &RedirectOutcome) -> AttemptState {
    if outcome.result_code != ResultCode::Ok {
        debug!("authorization browser dismissed");
        return AttemptState::Cancelled;
    }

    let Some(uri) = outcome.callback_uri.as_deref() else {
        return AttemptState::Failed(AuthFailure::NoRedirectUri);
    };

    let url = match Url::parse(uri) {
        Ok(url) => url,
        Err(e) => return AttemptState::Failed(AuthFailure::MalformedRedirectUri(e.to_string())),
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if code.is_none() => code = Some(value.into_owned()),
            "state" if state.is_none() => state = Some(value.into_owned()),
            "error" if error.is_none() => error = Some(value.into_owned()),
            "error_description" if description.is_none() => {
                description = Some(value.into_owned())
            }
            _ => {}
        }
    }

    if let Some(error) = error {
        debug!(error = %error, "provider returned an authorization error");
        return AttemptState::Failed(AuthFailure::Provider { error, description });
    }

    AttemptState::Succeeded { code, state }
}

//! CLI commands over one configured provider session

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use auth_redirect::{AuthorizationRequest, RedirectLauncher, authorize};
use token_cache::{
    CredentialRecord, JsonFileFieldStore, StoredTokenCache, get_tokens, remove_tokens,
    save_response, tokens_watch,
};
use token_refresh::{RefreshCoordinator, TokenEndpoint, refresh_with, spawn_refresh_task};
use tracing::{debug, info};

use crate::config::Config;

pub struct Session {
    cache: Arc<StoredTokenCache>,
    coordinator: Arc<RefreshCoordinator>,
    endpoint: Arc<TokenEndpoint>,
    authorization: AuthorizationRequest,
    min_validity_secs: i64,
    check_interval: Duration,
}

impl Session {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.refresh.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        let mut endpoint = TokenEndpoint::new(
            client,
            &config.provider.token_endpoint,
            &config.provider.client_id,
            &config.provider.redirect_uri,
        );
        if let Some(secret) = &config.provider.client_secret {
            endpoint = endpoint.with_client_secret(secret.clone());
        }

        let store = Arc::new(JsonFileFieldStore::new(&config.storage.path));
        let authorization = AuthorizationRequest {
            authorization_endpoint: config.provider.authorization_endpoint.clone(),
            client_id: config.provider.client_id.clone(),
            redirect_uri: config.provider.redirect_uri.clone(),
            scopes: config.provider.scopes.clone(),
        };

        Ok(Self::new(
            Arc::new(StoredTokenCache::new(store)),
            endpoint,
            authorization,
            config.refresh.min_validity_secs,
            Duration::from_secs(config.refresh.check_interval_secs),
        ))
    }

    fn new(
        cache: Arc<StoredTokenCache>,
        endpoint: TokenEndpoint,
        authorization: AuthorizationRequest,
        min_validity_secs: i64,
        check_interval: Duration,
    ) -> Self {
        Self {
            coordinator: Arc::new(RefreshCoordinator::new(cache.clone())),
            cache,
            endpoint: Arc::new(endpoint),
            authorization,
            min_validity_secs,
            check_interval,
        }
    }

    /// Run the authorization-code flow and store the resulting tokens.
    pub async fn login(&self, launcher: &dyn RedirectLauncher) -> Result<CredentialRecord> {
        let pending = self
            .authorization
            .start()
            .context("invalid authorization endpoint")?;

        let attempt = authorize(launcher, &pending.launch_request(None)).await;
        let code = pending.verify(attempt.into_result()?)?;
        debug!("authorization code received, exchanging");

        let response = self
            .endpoint
            .exchange_code(&code.code, &pending.verifier)
            .await?;
        let tokens = save_response(self.cache.as_ref(), response).await;
        info!(expires_in = ?tokens.expires_in(), "login complete");
        Ok(tokens)
    }

    pub async fn status(&self) -> Option<CredentialRecord> {
        get_tokens(self.cache.as_ref()).await
    }

    /// Access token valid for at least the configured minimum, refreshing first if needed.
    pub async fn token(&self) -> Result<String> {
        let token = self
            .coordinator
            .perform_with_fresh_tokens_within(
                self.min_validity_secs,
                refresh_with(self.endpoint.as_ref()),
                |tokens| async move { tokens.access_token().to_owned() },
            )
            .await?;
        Ok(token)
    }

    /// Refresh now, regardless of remaining lifetime.
    pub async fn refresh(&self) -> Result<CredentialRecord> {
        let current = get_tokens(self.cache.as_ref())
            .await
            .ok_or(token_refresh::Error::<token_refresh::EndpointError>::NoCredentials)?;
        let tokens = self
            .coordinator
            .refresh_and_save(refresh_with(self.endpoint.as_ref()), current.access_token())
            .await?;
        Ok(tokens)
    }

    pub async fn logout(&self) {
        remove_tokens(self.cache.as_ref()).await;
        info!("tokens removed");
    }

    /// Keep tokens fresh in the background and print each change until Ctrl-C.
    pub async fn watch(&self) -> Result<()> {
        let mut tokens = tokens_watch(self.cache.as_ref()).await;
        println!("{}", describe(tokens.current().as_ref(), common::now_epoch_secs()));

        let refresher = spawn_refresh_task(
            self.coordinator.clone(),
            self.endpoint.clone(),
            self.check_interval,
            Duration::from_secs(u64::try_from(self.min_validity_secs).unwrap_or(0)),
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted, stopping");
                    break;
                }
                changed = tokens.changed() => match changed {
                    Ok(current) => println!("{}", describe(current.as_ref(), common::now_epoch_secs())),
                    Err(_) => break,
                },
            }
        }

        refresher.abort();
        Ok(())
    }
}

/// Human-readable summary of the cached token set. Token values are never printed.
pub fn describe(tokens: Option<&CredentialRecord>, now: i64) -> String {
    let Some(tokens) = tokens else {
        return "not logged in".into();
    };

    let access = match tokens.access_expires_at() {
        Some(at) if at > now => format!("access token:  valid, expires in {}s", at - now),
        Some(_) => "access token:  expired".to_string(),
        None => "access token:  present, lifetime unknown".to_string(),
    };

    let refresh = match (tokens.refresh_token(), tokens.refresh_expires_at()) {
        (None, _) => "refresh token: none".to_string(),
        (Some(_), Some(at)) if at > now => format!("refresh token: valid, expires in {}s", at - now),
        (Some(_), Some(_)) => "refresh token: expired".to_string(),
        (Some(_), None) => "refresh token: present".to_string(),
    };

    let id = if tokens.id_token().is_some() {
        "present"
    } else {
        "none"
    };

    [access, refresh, format!("id token:      {id}")].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;

    use auth_redirect::{LaunchRequest, RedirectOutcome};
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use serde_json::json;
    use token_cache::TokenExchangeResponse;

    /// Fake token endpoint accepting code `good` and refresh token `rt_1`.
    async fn token_handler(
        Form(params): Form<HashMap<String, String>>,
    ) -> (axum::http::StatusCode, Json<serde_json::Value>) {
        use axum::http::StatusCode;
        match params.get("grant_type").map(String::as_str) {
            Some("authorization_code")
                if params.get("code").map(String::as_str) == Some("good")
                    && params.contains_key("code_verifier") =>
            {
                (
                    StatusCode::OK,
                    Json(json!({
                        "access_token": "at_1",
                        "refresh_token": "rt_1",
                        "id_token": "id_1",
                        "expires_in": 3600
                    })),
                )
            }
            Some("refresh_token") if params.get("refresh_token").map(String::as_str) == Some("rt_1") => (
                StatusCode::OK,
                Json(json!({"access_token": "at_2", "expires_in": 3600})),
            ),
            _ => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid_grant"})),
            ),
        }
    }

    async fn session() -> Session {
        let app = Router::new().route("/token", post(token_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let endpoint = TokenEndpoint::new(
            reqwest::Client::new(),
            format!("http://{addr}/token"),
            "my-app",
            "https://app.example.com/callback",
        );
        let authorization = AuthorizationRequest {
            authorization_endpoint: "https://idp.example.com/authorize".into(),
            client_id: "my-app".into(),
            redirect_uri: "https://app.example.com/callback".into(),
            scopes: "openid offline_access".into(),
        };
        Session::new(
            Arc::new(StoredTokenCache::in_memory()),
            endpoint,
            authorization,
            300,
            Duration::from_secs(60),
        )
    }

    /// Plays the provider: redirects back with `code` and the request's state.
    struct Provider {
        code: &'static str,
        forge_state: bool,
    }

    impl RedirectLauncher for Provider {
        fn launch<'a>(
            &'a self,
            request: &'a LaunchRequest,
        ) -> Pin<Box<dyn Future<Output = RedirectOutcome> + Send + 'a>> {
            Box::pin(async move {
                let url = url::Url::parse(&request.url).unwrap();
                let state = if self.forge_state {
                    "forged".to_owned()
                } else {
                    url.query_pairs()
                        .find(|(k, _)| k == "state")
                        .map(|(_, v)| v.into_owned())
                        .unwrap()
                };
                RedirectOutcome::completed(format!(
                    "https://app.example.com/callback?code={}&state={state}",
                    self.code
                ))
            })
        }
    }

    struct Dismissed;

    impl RedirectLauncher for Dismissed {
        fn launch<'a>(
            &'a self,
            _request: &'a LaunchRequest,
        ) -> Pin<Box<dyn Future<Output = RedirectOutcome> + Send + 'a>> {
            Box::pin(async { RedirectOutcome::canceled() })
        }
    }

    #[tokio::test]
    async fn login_stores_exchanged_tokens() {
        let session = session().await;
        let launcher = Provider {
            code: "good",
            forge_state: false,
        };

        let tokens = session.login(&launcher).await.unwrap();
        assert_eq!(tokens.access_token(), "at_1");
        assert_eq!(session.status().await, Some(tokens));
    }

    #[tokio::test]
    async fn login_rejects_forged_state() {
        let session = session().await;
        let launcher = Provider {
            code: "good",
            forge_state: true,
        };

        let err = session.login(&launcher).await.unwrap_err();
        assert!(err.to_string().contains("state mismatch"), "got: {err}");
        assert!(session.status().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_login_is_reported() {
        let session = session().await;
        let err = session.login(&Dismissed).await.unwrap_err();
        let redirect = err.downcast_ref::<auth_redirect::RedirectError>().unwrap();
        assert!(redirect.is_cancelled());
    }

    #[tokio::test]
    async fn token_requires_login() {
        let session = session().await;
        let err = session.token().await.unwrap_err();
        assert!(err.to_string().contains("no credentials"), "got: {err}");
    }

    #[tokio::test]
    async fn refresh_replaces_access_token_and_keeps_refresh_token() {
        let session = session().await;
        save_response(session.cache.as_ref(), {
            let mut response = TokenExchangeResponse::new("at_1");
            response.refresh_token = Some("rt_1".into());
            response.expires_in = Some(3600);
            response
        })
        .await;

        // Fresh enough: no refresh
        assert_eq!(session.token().await.unwrap(), "at_1");

        let tokens = session.refresh().await.unwrap();
        assert_eq!(tokens.access_token(), "at_2");
        assert_eq!(tokens.refresh_token(), Some("rt_1"));
        assert_eq!(session.token().await.unwrap(), "at_2");
    }

    #[tokio::test]
    async fn logout_clears_status() {
        let session = session().await;
        save_response(session.cache.as_ref(), TokenExchangeResponse::new("at_1")).await;
        session.logout().await;
        assert!(session.status().await.is_none());
    }

    #[test]
    fn describe_never_prints_token_values() {
        let tokens = CredentialRecord::from_fields(
            "secret-access".into(),
            Some("secret-refresh".into()),
            None,
            Some(3600),
            Some(100),
            Some(1000),
        );

        let text = describe(Some(&tokens), 1600);
        assert!(text.contains("access token:  valid, expires in 3000s"), "{text}");
        assert!(text.contains("refresh token: expired"), "{text}");
        assert!(text.contains("id token:      none"), "{text}");
        assert!(!text.contains("secret-"), "{text}");

        assert_eq!(describe(None, 0), "not logged in");
    }
}

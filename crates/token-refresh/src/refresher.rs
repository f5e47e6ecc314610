//! Refresh operation abstraction

use std::future::Future;
use std::pin::Pin;

use token_cache::TokenExchangeResponse;

/// Boxed future returned by [`Refresher::refresh`].
pub type RefreshFuture<'a, E> =
    Pin<Box<dyn Future<Output = Result<TokenExchangeResponse, E>> + Send + 'a>>;

/// Exchanges a refresh token for a new token set.
///
/// Timeouts are the implementation's business; the coordinator imposes none.
pub trait Refresher: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> RefreshFuture<'a, Self::Error>;
}

/// Adapt a [`Refresher`] into the one-shot operation the coordinator takes.
pub fn refresh_with<'a, R: Refresher + ?Sized>(
    refresher: &'a R,
) -> impl FnOnce(String) -> RefreshFuture<'a, R::Error> + Send + 'a {
    move |refresh_token: String| -> RefreshFuture<'a, R::Error> {
        Box::pin(async move { refresher.refresh(&refresh_token).await })
    }
}

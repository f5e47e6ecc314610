//! Proactive background token refresh
//!
//! Spawns a periodic task that refreshes the cached tokens before they
//! expire, so most callers of `perform_with_fresh_tokens` never wait on the
//! token endpoint. Refreshes go through the coordinator with the access token
//! observed at the start of the cycle, so they de-duplicate with request-time
//! refreshes.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::coordinator::RefreshCoordinator;
use crate::error::Error;
use crate::refresher::{Refresher, refresh_with};

/// What one refresh cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing cached; nobody is logged in.
    NoCredentials,
    /// Access token outlives the threshold.
    StillValid,
    Refreshed,
    /// Refresh failed; the next cycle retries.
    Failed,
}

/// Spawn a background task that refreshes tokens expiring within `threshold`.
///
/// Runs every `interval`. Failures are logged and retried on the next tick.
pub fn spawn_refresh_task<R>(
    coordinator: Arc<RefreshCoordinator>,
    refresher: Arc<R>,
    interval: Duration,
    threshold: Duration,
) -> tokio::task::JoinHandle<()>
where
    R: Refresher + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            refresh_cycle(&coordinator, refresher.as_ref(), threshold).await;
        }
    })
}

/// Run one refresh cycle.
pub async fn refresh_cycle<R>(
    coordinator: &RefreshCoordinator,
    refresher: &R,
    threshold: Duration,
) -> CycleOutcome
where
    R: Refresher + ?Sized,
{
    let Some(tokens) = token_cache::get_tokens(coordinator.cache().as_ref()).await else {
        debug!("no cached tokens, skipping background refresh");
        return CycleOutcome::NoCredentials;
    };

    let threshold_secs = i64::try_from(threshold.as_secs()).unwrap_or(i64::MAX);
    if !tokens.refresh_needed(threshold_secs) {
        return CycleOutcome::StillValid;
    }

    debug!(
        threshold_secs,
        "access token expiring within threshold, refreshing"
    );

    match coordinator
        .refresh_and_save(refresh_with(refresher), tokens.access_token())
        .await
    {
        Ok(_) => {
            info!("background token refresh succeeded");
            CycleOutcome::Refreshed
        }
        Err(Error::NoCredentials) => {
            debug!("tokens removed during background refresh");
            CycleOutcome::NoCredentials
        }
        Err(Error::Refresh(e)) => {
            warn!(error = %e, "background refresh failed, will retry next cycle");
            CycleOutcome::Failed
        }
    }
}

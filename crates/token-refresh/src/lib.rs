//! Single-flight token refresh
//!
//! Wraps a [`TokenCache`](token_cache::TokenCache) so that concurrent callers
//! never issue redundant refresh-token exchanges. The coordinator's lock covers
//! the staleness check, the refresh call, and the bulk save; callers that lose
//! the race find a different access token in the cache and reuse it.
//!
//! Refresh flow:
//! 1. Caller observes access token `A` and gets a 401 (or sees it near expiry)
//! 2. `RefreshCoordinator::refresh_and_save(op, "A")` takes the lock
//! 3. Cache still holds `A`: call `op(refresh_token)`, save, return new record
//! 4. Cache holds something else: another caller already refreshed, return it
//!
//! [`TokenEndpoint`] is the HTTP implementation of [`Refresher`];
//! [`spawn_refresh_task`] refreshes proactively in the background.

pub mod background;
pub mod coordinator;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod refresher;

pub use background::{CycleOutcome, refresh_cycle, spawn_refresh_task};
pub use coordinator::RefreshCoordinator;
pub use endpoint::TokenEndpoint;
pub use error::{EndpointError, Error};
pub use refresher::{RefreshFuture, Refresher, refresh_with};

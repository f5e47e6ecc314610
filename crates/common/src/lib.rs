//! Shared types for the OIDC session workspace

mod clock;
mod error;
mod secret;

pub use clock::now_epoch_secs;
pub use error::{Error, Result};
pub use secret::Secret;

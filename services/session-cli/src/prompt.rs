//! Terminal redirect launcher
//!
//! For hosts without an embedded browser: prints the authorization URL and
//! reads back the callback URL the user pastes from the browser's address
//! bar. An empty line or end of input cancels the attempt.

use std::future::Future;
use std::pin::Pin;

use auth_redirect::{LaunchRequest, RedirectLauncher, RedirectOutcome};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

pub struct PasteLauncher<R> {
    input: Mutex<R>,
}

impl<R> PasteLauncher<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }
}

impl PasteLauncher<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> RedirectLauncher for PasteLauncher<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn launch<'a>(
        &'a self,
        request: &'a LaunchRequest,
    ) -> Pin<Box<dyn Future<Output = RedirectOutcome> + Send + 'a>> {
        Box::pin(async move {
            eprintln!("Open this URL in a browser to sign in:\n\n  {}\n", request.url);
            eprintln!("Paste the URL you were redirected to (empty line cancels):");

            let mut guard = self.input.lock().await;
            let input = &mut *guard;
            let mut line = String::new();
            match input.read_line(&mut line).await {
                Ok(0) => RedirectOutcome::canceled(),
                Ok(_) => match line.trim() {
                    "" => RedirectOutcome::canceled(),
                    callback => RedirectOutcome::completed(callback),
                },
                Err(e) => {
                    warn!(error = %e, "failed to read callback URL");
                    RedirectOutcome::canceled()
                }
            }
        })
    }
}

//! OIDC session manager
//!
//! Command-line client that keeps one user's OAuth2/OIDC tokens on disk:
//! 1. `login` runs the authorization-code flow with PKCE
//! 2. `token` prints an access token, refreshing it first when near expiry
//! 3. `watch` refreshes in the background and reports every change
//!
//! Logs go to stderr so `token` output can be captured by scripts.

mod config;
mod prompt;
mod session;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::prompt::PasteLauncher;
use crate::session::{Session, describe};

const USAGE: &str = "usage: oidc-session [--config PATH] [--json] <login|status|token|refresh|logout|watch>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Login,
    Status,
    Token,
    Refresh,
    Logout,
    Watch,
}

#[derive(Debug, PartialEq, Eq)]
struct Cli {
    config: Option<String>,
    json_logs: bool,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut config = None;
    let mut json_logs = false;
    let mut command = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().ok_or("--config requires a path")?;
                config = Some(path.clone());
            }
            "--json" => json_logs = true,
            other if command.is_none() => {
                command = Some(match other {
                    "login" => Command::Login,
                    "status" => Command::Status,
                    "token" => Command::Token,
                    "refresh" => Command::Refresh,
                    "logout" => Command::Logout,
                    "watch" => Command::Watch,
                    _ => return Err(format!("unknown command: {other}")),
                });
            }
            other => return Err(format!("unexpected argument: {other}")),
        }
    }

    Ok(Cli {
        config,
        json_logs,
        command: command.ok_or("missing command")?,
    })
}

fn init_tracing(json: bool) {
    // LOG_LEVEL / RUST_LOG, defaulting to info; stdout is reserved for command output
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("{msg}\n{USAGE}");
            std::process::exit(2);
        }
    };

    init_tracing(cli.json_logs);

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        token_endpoint = %config.provider.token_endpoint,
        client_id = %config.provider.client_id,
        storage = %config.storage.path.display(),
        confidential = config.provider.client_secret.is_some(),
        "configuration loaded"
    );

    let session = Session::from_config(&config)?;

    match cli.command {
        Command::Login => match session.login(&PasteLauncher::stdin()).await {
            Ok(tokens) => println!("{}", describe(Some(&tokens), common::now_epoch_secs())),
            Err(e)
                if e.downcast_ref::<auth_redirect::RedirectError>()
                    .is_some_and(|e| e.is_cancelled()) =>
            {
                eprintln!("login cancelled");
                std::process::exit(1);
            }
            Err(e) => return Err(e),
        },
        Command::Status => {
            let tokens = session.status().await;
            println!("{}", describe(tokens.as_ref(), common::now_epoch_secs()));
        }
        Command::Token => println!("{}", session.token().await?),
        Command::Refresh => {
            let tokens = session.refresh().await?;
            println!("{}", describe(Some(&tokens), common::now_epoch_secs()));
        }
        Command::Logout => session.logout().await,
        Command::Watch => session.watch().await?,
    }

    Ok(())
}

//! Configuration types and loading
//!
//! Config path precedence: `--config` > `OIDC_SESSION_CONFIG` > `oidc-session.toml`.
//! The client secret is loaded from `OIDC_CLIENT_SECRET` or `client_secret_file`,
//! never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// Identity provider endpoints and client registration
#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to OIDC_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
}

/// Where the token fields are persisted
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
}

/// Refresh policy
#[derive(Debug, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_min_validity")]
    pub min_validity_secs: i64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// How often `watch` checks for expiring tokens
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            min_validity_secs: default_min_validity(),
            timeout_secs: default_timeout(),
            check_interval_secs: default_check_interval(),
        }
    }
}

fn default_scopes() -> String {
    "openid profile offline_access".into()
}

fn default_min_validity() -> i64 {
    token_cache::record::DEFAULT_MIN_VALIDITY_SECS
}

fn default_timeout() -> u64 {
    30
}

fn default_check_interval() -> u64 {
    60
}

fn require_http(name: &str, value: &str) -> common::Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(());
    }
    Err(common::Error::Config(format!(
        "{name} must start with http:// or https://, got: {value}"
    )))
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. OIDC_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| common::Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&contents)?;

        require_http(
            "authorization_endpoint",
            &config.provider.authorization_endpoint,
        )?;
        require_http("token_endpoint", &config.provider.token_endpoint)?;

        if config.provider.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        if config.refresh.min_validity_secs <= 0 {
            return Err(common::Error::Config(
                "min_validity_secs must be greater than 0".into(),
            ));
        }

        if config.refresh.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.refresh.check_interval_secs == 0 {
            return Err(common::Error::Config(
                "check_interval_secs must be greater than 0".into(),
            ));
        }

        if let Ok(secret) = std::env::var("OIDC_CLIENT_SECRET") {
            config.provider.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.provider.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.provider.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or OIDC_SESSION_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("OIDC_SESSION_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("oidc-session.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn valid_toml() -> &'static str {
        r#"
[provider]
authorization_endpoint = "https://idp.example.com/oauth2/authorize"
token_endpoint = "https://idp.example.com/oauth2/token"
client_id = "my-app"
redirect_uri = "https://app.example.com/callback"

[storage]
path = "tokens.json"
"#
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("oidc-session.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("OIDC_CLIENT_SECRET") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.provider.client_id, "my-app");
        assert_eq!(config.provider.scopes, "openid profile offline_access");
        assert_eq!(config.storage.path, PathBuf::from("tokens.json"));
        assert_eq!(config.refresh.min_validity_secs, 300);
        assert_eq!(config.refresh.timeout_secs, 30);
        assert_eq!(config.refresh.check_interval_secs, 60);
        assert!(config.provider.client_secret.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/path/oidc-session.toml")).unwrap_err();
        assert!(matches!(err, common::Error::Read { .. }));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(
            Config::load(&path).unwrap_err(),
            common::Error::Toml(_)
        ));
    }

    #[test]
    fn test_rejects_non_http_token_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let toml = valid_toml().replace(
            "https://idp.example.com/oauth2/token",
            "ftp://idp.example.com/token",
        );
        let path = write_config(&dir, &toml);
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("token_endpoint"), "got: {err}");
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!("{}\n[refresh]\ntimeout_secs = 0\n", valid_toml());
        let path = write_config(&dir, &toml);
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"), "got: {err}");
    }

    #[test]
    fn test_rejects_empty_client_id() {
        let dir = tempfile::tempdir().unwrap();
        let toml = valid_toml().replace("client_id = \"my-app\"", "client_id = \"  \"");
        let path = write_config(&dir, &toml);
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_client_secret_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        unsafe { set_env("OIDC_CLIENT_SECRET", "from-env") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env("OIDC_CLIENT_SECRET") };

        assert_eq!(
            config.provider.client_secret.as_ref().map(|s| s.expose().as_str()),
            Some("from-env")
        );
    }

    #[test]
    fn test_client_secret_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("OIDC_CLIENT_SECRET") };
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("client-secret");
        std::fs::write(&secret_path, "from-file\n").unwrap();
        let toml = valid_toml().replace(
            "redirect_uri = \"https://app.example.com/callback\"",
            &format!(
                "redirect_uri = \"https://app.example.com/callback\"\nclient_secret_file = {:?}",
                secret_path.display().to_string()
            ),
        );
        let path = write_config(&dir, &toml);

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.provider.client_secret.as_ref().map(|s| s.expose().as_str()),
            Some("from-file")
        );
    }

    #[test]
    fn test_resolve_path_prefers_cli() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("OIDC_SESSION_CONFIG", "/from/env.toml") };
        assert_eq!(
            Config::resolve_path(Some("/from/cli.toml")),
            PathBuf::from("/from/cli.toml")
        );
        assert_eq!(Config::resolve_path(None), PathBuf::from("/from/env.toml"));
        unsafe { remove_env("OIDC_SESSION_CONFIG") };
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("oidc-session.toml")
        );
    }
}

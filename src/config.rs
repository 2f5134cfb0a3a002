//! Configuration management for karaoke.
//!
//! Configuration comes from environment variables, optionally seeded from a
//! `.env` file in the local data directory. The process environment is read
//! once into an [`EnvVars`] snapshot, and everything downstream works on that
//! snapshot, so configuration and the environment credential source are
//! plain functions of their input.
//!
//! The lookup order is:
//! 1. Process environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults

use std::{collections::HashMap, path::PathBuf, str::FromStr, time::Duration};

use crate::{error::AuthError, types::split_scopes};

pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SCOPES: &str = "user-read-playback-state user-read-currently-playing";
pub const DEFAULT_REDIRECT_HOST: &str = "127.0.0.1";
pub const DEFAULT_REDIRECT_PORT: u16 = 4321;
pub const DEFAULT_REDIRECT_PATH: &str = "/oauth/callback";

pub const ENV_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
pub const ENV_ACCESS_TOKEN: &str = "SPOTIFY_ACCESS_TOKEN";
pub const ENV_REFRESH_TOKEN: &str = "SPOTIFY_REFRESH_TOKEN";

const APP_DIR: &str = "karaoke";

/// Loads environment variables from `<data_local_dir>/karaoke/.env`.
///
/// A missing file is fine; variables already present in the process
/// environment are never overwritten. A file that exists but cannot be
/// parsed is reported.
///
/// # Directory Structure
///
/// - Linux: `~/.local/share/karaoke/.env`
/// - macOS: `~/Library/Application Support/karaoke/.env`
/// - Windows: `%LOCALAPPDATA%/karaoke/.env`
pub async fn load_env() -> Result<(), AuthError> {
    let path = env_file_path();
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|source| AuthError::Io {
                operation: "create directory",
                path: parent.to_path_buf(),
                source,
            })?;
    }

    if !path.is_file() {
        tracing::debug!(path = %path.display(), "no .env file, using process environment");
        return Ok(());
    }

    dotenv::from_path(&path).map_err(|e| AuthError::Decode {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    tracing::debug!(path = %path.display(), "loaded .env file");
    Ok(())
}

pub fn env_file_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push(".env");
    path
}

/// Default location of the persisted credential record.
pub fn default_credentials_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push("credentials.json");
    path
}

/// Immutable snapshot of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    /// Captures the current process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// The value of `key`, treating blank values as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, AuthError>
    where
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| AuthError::Config(format!("{key}={raw:?}: {e}"))),
        }
    }
}

/// Runtime settings for the authorization flow and API access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
    pub scopes: Vec<String>,
    /// Joins scopes in the authorize URL; Spotify expects a space.
    pub scope_separator: String,
    pub redirect_host: String,
    /// `0` lets the OS choose, which only makes sense in tests.
    pub redirect_port: u16,
    pub redirect_path: String,
    /// `None` waits for the browser indefinitely.
    pub login_timeout: Option<Duration>,
    pub http_timeout: Duration,
    /// Tokens are treated as expired this long before their expiry.
    pub expiry_margin: Duration,
    pub credentials_path: PathBuf,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            scopes: split_scopes(DEFAULT_SCOPES),
            scope_separator: " ".to_string(),
            redirect_host: DEFAULT_REDIRECT_HOST.to_string(),
            redirect_port: DEFAULT_REDIRECT_PORT,
            redirect_path: DEFAULT_REDIRECT_PATH.to_string(),
            login_timeout: Some(Duration::from_secs(120)),
            http_timeout: Duration::from_secs(10),
            expiry_margin: Duration::from_secs(60),
            credentials_path: default_credentials_path(),
            log_level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads settings from `env`, falling back to defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] when a numeric setting cannot be parsed
    /// or the redirect path does not start with `/`.
    pub fn from_env(env: &EnvVars) -> Result<Self, AuthError> {
        let defaults = AppConfig::default();

        let redirect_path = env
            .get("KARAOKE_REDIRECT_PATH")
            .map(str::to_string)
            .unwrap_or(defaults.redirect_path);
        if !redirect_path.starts_with('/') {
            return Err(AuthError::Config(format!(
                "KARAOKE_REDIRECT_PATH must start with '/', got {redirect_path:?}"
            )));
        }

        let login_timeout = match env.parse("KARAOKE_LOGIN_TIMEOUT_SECS", 120u64)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            auth_url: string_or(env, "SPOTIFY_AUTH_URL", defaults.auth_url),
            token_url: string_or(env, "SPOTIFY_TOKEN_URL", defaults.token_url),
            api_url: string_or(env, "SPOTIFY_API_URL", defaults.api_url),
            scopes: env
                .get("SPOTIFY_SCOPES")
                .map(split_scopes)
                .unwrap_or(defaults.scopes),
            scope_separator: env
                .vars
                .get("KARAOKE_SCOPE_SEPARATOR")
                .filter(|s| !s.is_empty())
                .cloned()
                .unwrap_or(defaults.scope_separator),
            redirect_host: string_or(env, "KARAOKE_REDIRECT_HOST", defaults.redirect_host),
            redirect_port: env.parse("KARAOKE_REDIRECT_PORT", defaults.redirect_port)?,
            redirect_path,
            login_timeout,
            http_timeout: Duration::from_secs(env.parse("KARAOKE_HTTP_TIMEOUT_SECS", 10u64)?),
            expiry_margin: Duration::from_secs(env.parse("KARAOKE_EXPIRY_MARGIN_SECS", 60u64)?),
            credentials_path: env
                .get("KARAOKE_CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_path),
            log_level: string_or(env, "KARAOKE_LOG_LEVEL", defaults.log_level),
        })
    }
}

fn string_or(env: &EnvVars, key: &str, default: String) -> String {
    env.get(key).map(str::to_string).unwrap_or(default)
}

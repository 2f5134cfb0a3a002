//! # CLI Module
//!
//! Command implementations for the `karaoke` binary. Each command builds
//! its collaborators from a [`CommandContext`], runs, and reports the outcome
//! with the colored console macros (`info!`, `success!`, `warning!`,
//! `error!`).
//!
//! ## Commands
//!
//! - [`login`] - runs the browser-based authorization and saves the credential
//! - [`status`] - shows the resolved credential without touching the network
//! - [`logout`] - deletes the saved credential
//! - [`now_playing`] - makes sure the session is authenticated (refreshing or
//!   logging in as needed) and prints the current track
//!
//! ## Credential Sources
//!
//! Credentials are merged from, in order of precedence:
//!
//! 1. the file given with `--credentials` (TOML)
//! 2. `SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET`, `SPOTIFY_ACCESS_TOKEN`,
//!    `SPOTIFY_REFRESH_TOKEN`
//! 3. the credential saved by the last login
//! 4. the configured scopes
//!
//! ## Error Handling
//!
//! Library errors end the command with the error and, where one exists, a
//! hint on what to do next (for example rerunning `karaoke auth login`).
//! A login can be interrupted with Ctrl-C; the callback server is stopped and
//! the port released.
//!
//! ## Usage Patterns
//!
//! ```bash
//! karaoke auth login              # Log in through the browser
//! karaoke auth status             # Inspect what is stored
//! karaoke now-playing --follow    # Print the current and the next track
//! ```

mod auth;
mod playing;

use std::{path::PathBuf, time::Duration};

pub use auth::{login, logout, status};
pub use playing::now_playing;

use crate::{
    config::{AppConfig, EnvVars},
    error::AuthError,
    error,
    management::{CredentialResolver, CredentialStore, TokenLifecycleManager},
    spotify::{
        SpotifyClient,
        auth::{AuthorizationFlow, NoBrowser},
    },
    types::Credential,
};

/// Everything a command needs to build its collaborators.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: AppConfig,
    pub env: EnvVars,
    pub credentials_file: Option<PathBuf>,
    pub no_browser: bool,
}

impl CommandContext {
    pub fn new(config: AppConfig, env: EnvVars) -> Self {
        Self {
            config,
            env,
            credentials_file: None,
            no_browser: false,
        }
    }

    pub fn store(&self) -> CredentialStore {
        CredentialStore::new(self.config.credentials_path.clone())
    }

    pub fn resolver(&self) -> CredentialResolver {
        CredentialResolver::standard(
            self.credentials_file.clone(),
            self.env.clone(),
            self.store(),
            Credential {
                scopes: self.config.scopes.clone(),
                ..Credential::default()
            },
        )
    }

    pub fn spotify(&self) -> Result<SpotifyClient, AuthError> {
        SpotifyClient::new(&self.config)
    }

    pub fn manager(&self) -> Result<TokenLifecycleManager, AuthError> {
        let mut flow = AuthorizationFlow::new(self.spotify()?, &self.config);
        if self.no_browser {
            flow = flow.with_browser(NoBrowser);
        }

        Ok(TokenLifecycleManager::new(flow, self.store(), self.resolver())
            .with_expiry_margin(self.config.expiry_margin))
    }

    /// Overrides the login timeout; `0` waits indefinitely.
    pub fn set_login_timeout(&mut self, secs: u64) {
        self.config.login_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
}

/// Prints the error with its hint and exits.
fn exit_with(e: &AuthError) -> ! {
    match e.hint() {
        Some(hint) => error!("{}\n    {}", e, hint),
        None => error!("{}", e),
    }
}

/// Sleeps for `duration`. Returns `false` if Ctrl-C arrived first.
///
/// Once a Ctrl-C listener was installed the default SIGINT handling is gone
/// for the rest of the process, so long waits have to listen themselves.
async fn pause(duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!("wait interrupted");
            false
        }
    }
}

/// Runs an interactive step, turning Ctrl-C into [`AuthError::Cancelled`].
async fn interruptible<T>(
    step: impl Future<Output = Result<T, AuthError>>,
) -> Result<T, AuthError> {
    tokio::select! {
        result = step => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!("login interrupted");
            Err(AuthError::Cancelled)
        }
    }
}

//! # Spotify Integration Module
//!
//! Talks to Spotify's accounts service and Web API.
//!
//! ## Overview
//!
//! ```text
//! CLI Layer
//!     ↓
//! Management Layer (TokenLifecycleManager, CredentialStore)
//!     ↓
//! Spotify Integration Layer
//!     ├── auth   (authorization-code flow, code exchange, refresh)
//!     └── player (currently playing track)
//!          ↓
//! HTTP Layer (reqwest, JSON)
//! ```
//!
//! All requests go through a [`SpotifyClient`] that the caller constructs and
//! passes by reference. It owns one `reqwest::Client` (connection pool and
//! request timeout) and the endpoint URLs, so there is no process-wide HTTP
//! state and tests can point the client at local fake servers.
//!
//! ## Authentication
//!
//! [`auth::AuthorizationFlow`] runs the browser-based authorization-code grant
//! against a loopback redirect:
//!
//! 1. **Server Start**: a [`CallbackServer`](crate::server::CallbackServer) binds the redirect address
//! 2. **Browser Launch**: the authorize URL is opened, or printed if no browser can be launched
//! 3. **Callback**: the redirect is checked against the per-attempt `state` nonce
//! 4. **Token Exchange**: the code is exchanged at the token endpoint with HTTP Basic client authentication
//!
//! The flow returns the token grant; persisting it is the caller's job.
//!
//! ## Error Types
//!
//! Every function returns [`AuthError`](crate::error::AuthError). Upstream
//! rejections keep the HTTP status and the raw error payload.

pub mod auth;
pub mod player;

use crate::{config::AppConfig, error::AuthError};

/// HTTP client plus the endpoints it talks to.
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    auth_url: String,
    token_url: String,
    api_url: String,
}

impl SpotifyClient {
    pub fn new(config: &AppConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| AuthError::Http {
                operation: "build http client",
                source,
            })?;

        Ok(Self {
            http,
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

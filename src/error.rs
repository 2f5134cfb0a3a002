//! Error taxonomy for authentication and credential handling.
//!
//! Every fallible operation in the library returns [`AuthError`]. Network and
//! file errors carry the operation (and path, where there is one) they came
//! from so the message shown to the user names what was being attempted.

use std::{path::PathBuf, time::Duration};

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors produced while resolving, refreshing or acquiring credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The loopback callback address could not be bound.
    #[error("cannot listen for the authorization callback on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The callback carried a missing or foreign `state` value.
    #[error("authorization callback rejected: state does not match this login attempt")]
    StateMismatch,

    /// The browser step was not completed in time.
    #[error("no authorization callback received within {}s", .0.as_secs())]
    Timeout(Duration),

    /// The login attempt was cancelled before a callback arrived.
    #[error("authorization was cancelled before a callback arrived")]
    Cancelled,

    /// The provider redirected back with an `error` parameter.
    #[error("authorization denied by provider: {error}{}", describe(.description))]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    /// The callback had a valid state but no `code`.
    #[error("authorization callback did not contain a code")]
    MissingCode,

    /// The token endpoint rejected the authorization code.
    #[error("token exchange failed ({status}): {}", upstream_message(.payload))]
    TokenExchange { status: StatusCode, payload: String },

    /// The token endpoint rejected the refresh token.
    #[error("token refresh failed ({status}): {}", upstream_message(.payload))]
    Refresh { status: StatusCode, payload: String },

    /// The Web API answered with an error object.
    #[error("spotify api error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("{operation} failed: {source}")]
    Http {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot {operation} {}: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A credential file exists but does not hold a credential record.
    #[error("cannot parse credential file {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("cannot serialize credential: {0}")]
    Encode(#[from] serde_json::Error),

    /// Graceful shutdown of the callback server failed.
    #[error("callback server shutdown failed: {0}")]
    Shutdown(String),

    /// A field required to talk to the provider was not set by any source.
    #[error("missing {0}; set it in the credentials file or the environment")]
    MissingCredential(&'static str),

    /// The access token expired and there is no refresh token to renew it.
    #[error("access token expired and no refresh token is available")]
    Expired,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// Whether rerunning the interactive login can resolve this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::StateMismatch
                | AuthError::Timeout(_)
                | AuthError::Cancelled
                | AuthError::AuthorizationDenied { .. }
                | AuthError::MissingCode
                | AuthError::TokenExchange { .. }
                | AuthError::Refresh { .. }
                | AuthError::Expired
        )
    }

    /// A short, actionable remedy to print next to the error.
    pub fn hint(&self) -> Option<String> {
        match self {
            AuthError::Bind { addr, .. } => Some(format!(
                "Free {addr} or choose another port with KARAOKE_REDIRECT_PORT (it must match the redirect URI registered with Spotify)."
            )),
            AuthError::Timeout(_) | AuthError::Cancelled => {
                Some("Run `karaoke auth login` again and finish the login in your browser.".into())
            }
            AuthError::StateMismatch => Some(
                "Close stale login tabs and run `karaoke auth login` again.".into(),
            ),
            AuthError::MissingCredential(_) => Some(
                "Set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET or pass --credentials <FILE>.".into(),
            ),
            AuthError::Decode { path, .. } => Some(format!(
                "Fix or delete {} and log in again.",
                path.display()
            )),
            e if e.is_recoverable() => Some("Run `karaoke auth login` to log in again.".into()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

/// Renders an OAuth error payload, falling back to the raw body.
pub(crate) fn upstream_message(payload: &str) -> String {
    match serde_json::from_str::<OAuthErrorBody>(payload) {
        Ok(body) => format!("{}{}", body.error, describe(&body.error_description)),
        Err(_) if payload.trim().is_empty() => "empty response body".to_string(),
        Err(_) => payload.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_message_prefers_oauth_fields() {
        let payload = r#"{"error":"invalid_grant","error_description":"Invalid authorization code"}"#;
        assert_eq!(
            upstream_message(payload),
            "invalid_grant (Invalid authorization code)"
        );
    }

    #[test]
    fn upstream_message_falls_back_to_raw_body() {
        assert_eq!(upstream_message("  bad gateway \n"), "bad gateway");
        assert_eq!(upstream_message(""), "empty response body");
    }

    #[test]
    fn exchange_error_display_keeps_status_and_reason() {
        let err = AuthError::TokenExchange {
            status: StatusCode::BAD_REQUEST,
            payload: r#"{"error":"invalid_client"}"#.to_string(),
        };
        assert_eq!(
            err.to_string(),
            "token exchange failed (400 Bad Request): invalid_client"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn bind_error_is_fatal_with_hint() {
        let err = AuthError::Bind {
            addr: "127.0.0.1:4321".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(!err.is_recoverable());
        assert!(err.hint().unwrap().contains("KARAOKE_REDIRECT_PORT"));
    }
}

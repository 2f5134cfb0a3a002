//! Data structures shared across karaoke.
//!
//! - [`Credential`] is the unit that is resolved, persisted and replaced
//! - [`TokenGrant`], [`AuthorizationState`] and [`CallbackResult`] carry the
//!   pieces of one authorization attempt
//! - [`Session`] is what the token lifecycle reports back to commands
//! - [`CurrentlyPlaying`] and friends mirror the Web API player payloads
//! - [`CredentialTableRow`] is one line of the `auth status` table

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::error::AuthError;

/// Everything needed to call the Spotify API on behalf of one user.
///
/// Every field is optional because credentials are assembled from several
/// sources, each of which may only know a subset. The access token and its
/// expiry travel together: records built from a token grant always set both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl Credential {
    /// Fills every field that is still unset from `other`.
    ///
    /// The access token and expiry are taken as a pair, so a lower-priority
    /// source can never attach its expiry to another source's token.
    pub fn fill_from(&mut self, other: Credential) {
        fill(&mut self.client_id, other.client_id);
        fill(&mut self.client_secret, other.client_secret);
        fill(&mut self.refresh_token, other.refresh_token);

        if self.access_token.is_none() && other.access_token.as_deref().is_some_and(has_text) {
            self.access_token = other.access_token;
            self.expires_at = other.expires_at;
        }

        if self.scopes.is_empty() {
            self.scopes = other.scopes;
        }
    }

    /// Builds the replacement record after a successful grant.
    ///
    /// Client identity is carried over; a grant that omits the refresh token
    /// keeps the previous one.
    pub fn with_grant(&self, grant: TokenGrant, now: DateTime<Utc>) -> Credential {
        let scopes = grant
            .scope
            .as_deref()
            .map(split_scopes)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.scopes.clone());

        Credential {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            expires_at: Some(now + Duration::seconds(lifetime_secs(grant.expires_in))),
            access_token: Some(grant.access_token),
            refresh_token: grant.refresh_token.or_else(|| self.refresh_token.clone()),
            scopes,
        }
    }

    /// The client id/secret pair, or the name of the first missing field.
    pub fn client(&self) -> Result<ClientCredentials, AuthError> {
        let id = self
            .client_id
            .clone()
            .ok_or(AuthError::MissingCredential("client id"))?;
        let secret = self
            .client_secret
            .clone()
            .ok_or(AuthError::MissingCredential("client secret"))?;
        Ok(ClientCredentials { id, secret })
    }

    /// True once `now` is within `margin` of the expiry. Unknown expiry is
    /// never expired by itself.
    pub fn is_expired_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at.is_some_and(|at| now + margin >= at)
    }

    /// True when no source set any field.
    pub fn is_empty(&self) -> bool {
        *self == Credential::default()
    }
}

/// Upper bound on a grant's lifetime, keeping expiry arithmetic in range.
const MAX_LIFETIME_SECS: i64 = 366 * 24 * 60 * 60;

fn lifetime_secs(expires_in: u64) -> i64 {
    i64::try_from(expires_in)
        .unwrap_or(MAX_LIFETIME_SECS)
        .min(MAX_LIFETIME_SECS)
}

fn has_text(s: &str) -> bool {
    !s.trim().is_empty()
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value.filter(|v| has_text(v));
    }
}

/// Splits a scope list on spaces or commas, whichever the source used.
pub fn split_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// The client half of a credential, required by every token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub id: String,
    pub secret: String,
}

/// Successful token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Per-attempt data binding a redirect to the login that started it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationState {
    pub nonce: String,
    pub redirect_uri: String,
    pub path: String,
}

/// What the browser brought back to the callback endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackResult {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackResult {
    /// The authorization code, or the reason there is none.
    pub fn into_code(self) -> Result<String, AuthError> {
        if let Some(error) = self.error {
            return Err(AuthError::AuthorizationDenied {
                error,
                description: self.error_description,
            });
        }
        self.code.filter(|c| !c.is_empty()).ok_or(AuthError::MissingCode)
    }
}

/// Outcome of [`crate::management::TokenLifecycleManager::ensure_authenticated`].
#[derive(Debug)]
pub enum Session {
    /// A usable access token is available.
    Authenticated(Credential),
    /// The stored token could not be renewed; the user has to log in again.
    ReauthenticationRequired(AuthError),
}

impl Session {
    /// Whether an access token can be used right away.
    ///
    /// # Returns
    ///
    /// `true` for [`Session::Authenticated`], `false` when the caller has to
    /// run the interactive login first.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }
}

/// Playback state from `GET /me/player/currently-playing`.
///
/// # Fields
///
/// - `progress_ms` - position in the current item, absent for some devices
/// - `is_playing` - `false` while paused
/// - `item` - the track; `None` for ads or while switching tracks
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub is_playing: bool,
    pub item: Option<PlayingItem>,
}

/// The track that is playing.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayingItem {
    pub name: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub artists: Vec<PlayingArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayingArtist {
    pub name: String,
}

/// Error envelope of the Web API: `{"error": {"status": 401, "message": "..."}}`.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub message: String,
}

/// One row of the `karaoke auth status` table.
#[derive(Tabled)]
pub struct CredentialTableRow {
    pub field: String,
    pub value: String,
}

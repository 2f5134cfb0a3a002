use chrono::{Duration, Utc};

use crate::{
    error::AuthError,
    management::{CredentialResolver, CredentialStore},
    spotify::auth::AuthorizationFlow,
    types::{Credential, Session},
};

/// Decides whether a stored token can be reused, must be refreshed, or needs
/// a fresh interactive login, and persists every new token it obtains.
///
/// | access token | expiry    | action                                                   |
/// |--------------|-----------|----------------------------------------------------------|
/// | absent       | -         | refresh if a refresh token exists, else interactive login |
/// | present      | in future | reuse, no network                                        |
/// | present      | past      | refresh and persist; on failure re-auth                  |
/// | present      | unknown   | refresh if a refresh token exists, else reuse            |
///
/// An access token of unknown expiry (e.g. from `SPOTIFY_ACCESS_TOKEN`) is
/// replaced by the persisted one when both belong to the same refresh token
/// and the persisted one is still valid, so a refresh is not repeated on
/// every run.
#[derive(Debug)]
pub struct TokenLifecycleManager {
    flow: AuthorizationFlow,
    store: CredentialStore,
    resolver: CredentialResolver,
    expiry_margin: Duration,
    credential: Option<Credential>,
    authenticated: bool,
}

impl TokenLifecycleManager {
    pub fn new(flow: AuthorizationFlow, store: CredentialStore, resolver: CredentialResolver) -> Self {
        Self {
            flow,
            store,
            resolver,
            expiry_margin: Duration::zero(),
            credential: None,
            authenticated: false,
        }
    }

    /// Treat tokens as expired this long before their recorded expiry.
    #[must_use]
    pub fn with_expiry_margin(mut self, margin: std::time::Duration) -> Self {
        self.expiry_margin = Duration::from_std(margin).unwrap_or_else(|_| Duration::zero());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// The credential from the last resolution, login or refresh.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// The access token, only while authenticated.
    pub fn access_token(&self) -> Option<&str> {
        if !self.authenticated {
            return None;
        }
        self.credential.as_ref()?.access_token.as_deref()
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Makes sure a usable access token is available.
    ///
    /// A failed refresh is not an error: it yields
    /// [`Session::ReauthenticationRequired`] and leaves the decision to run
    /// [`login`](Self::login) to the caller.
    ///
    /// # Errors
    ///
    /// Resolution failures (unreadable or corrupt credential files), missing
    /// client credentials, failures of the interactive login when no token
    /// was stored, and failures to persist a new token.
    pub async fn ensure_authenticated(&mut self) -> Result<Session, AuthError> {
        let current = self.prefer_persisted(self.resolver.resolve().await?).await?;

        if current.access_token.is_none() && current.refresh_token.is_none() {
            tracing::debug!("no stored access token, starting interactive authorization");
            let credential = self.authorize(current).await?;
            return Ok(Session::Authenticated(credential));
        }

        let expired = current.is_expired_at(Utc::now(), self.expiry_margin);
        let expiry_unknown = current.expires_at.is_none();

        let refresh_token = match current.refresh_token.clone() {
            Some(token) if current.access_token.is_none() || expired || expiry_unknown => token,
            None if expired => {
                tracing::debug!(expiry = ?current.expires_at, "token expired without refresh token");
                self.mark_unauthenticated(current);
                return Ok(Session::ReauthenticationRequired(AuthError::Expired));
            }
            _ => {
                tracing::debug!(expiry = ?current.expires_at, "stored token still valid");
                self.mark_authenticated(current.clone());
                return Ok(Session::Authenticated(current));
            }
        };

        tracing::debug!(expiry = ?current.expires_at, "refreshing access token");
        let client = current.client()?;
        match self.flow.refresh(&client, &refresh_token).await {
            Ok(grant) => {
                let refreshed = current.with_grant(grant, Utc::now());
                self.store.save(&refreshed).await?;
                tracing::debug!(expiry = ?refreshed.expires_at, "refreshed access token");
                self.mark_authenticated(refreshed.clone());
                Ok(Session::Authenticated(refreshed))
            }
            Err(e) => {
                tracing::warn!(error = %e, "stored credentials could not be refreshed, re-authentication needed");
                self.mark_unauthenticated(current);
                Ok(Session::ReauthenticationRequired(e))
            }
        }
    }

    /// Runs the interactive login regardless of what is stored.
    pub async fn login(&mut self) -> Result<Credential, AuthError> {
        let current = self.resolver.resolve().await?;
        self.authorize(current).await
    }

    /// Forgets the persisted credential.
    pub async fn logout(&mut self) -> Result<(), AuthError> {
        self.store.clear().await?;
        self.credential = None;
        self.authenticated = false;
        Ok(())
    }

    async fn authorize(&mut self, current: Credential) -> Result<Credential, AuthError> {
        self.authenticated = false;
        let client = current.client()?;
        let scopes = self.resolver.requested_scopes().await?;
        let flow = self.flow.clone().with_scopes(scopes);

        let grant = flow.authorize(&client).await?;
        let credential = current.with_grant(grant, Utc::now());
        self.store.save(&credential).await?;
        tracing::debug!(path = %self.store.path().display(), "saved credentials to disk");

        self.mark_authenticated(credential.clone());
        Ok(credential)
    }

    /// Swaps an undated access token for the persisted one when the persisted
    /// token was obtained with the same refresh token and has not expired.
    async fn prefer_persisted(&self, mut current: Credential) -> Result<Credential, AuthError> {
        if current.access_token.is_none() || current.expires_at.is_some() {
            return Ok(current);
        }
        let Some(stored) = self.store.load().await? else {
            return Ok(current);
        };

        let same_grant = stored.refresh_token.is_some() && stored.refresh_token == current.refresh_token;
        if same_grant
            && stored.access_token.is_some()
            && stored.expires_at.is_some()
            && !stored.is_expired_at(Utc::now(), self.expiry_margin)
        {
            tracing::debug!(expiry = ?stored.expires_at, "using persisted token over undated override");
            current.access_token = stored.access_token;
            current.expires_at = stored.expires_at;
        }
        Ok(current)
    }

    fn mark_authenticated(&mut self, credential: Credential) {
        self.credential = Some(credential);
        self.authenticated = true;
    }

    fn mark_unauthenticated(&mut self, credential: Credential) {
        self.credential = Some(credential);
        self.authenticated = false;
    }
}

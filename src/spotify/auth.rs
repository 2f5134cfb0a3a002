use std::{sync::Arc, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{StatusCode, header::AUTHORIZATION};
use url::Url;

use crate::{
    config::AppConfig,
    error::AuthError,
    info,
    server::CallbackServer,
    spotify::SpotifyClient,
    types::{AuthorizationState, ClientCredentials, TokenGrant},
    utils, warning,
};

/// Opens a URL for the user.
pub trait Browser: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Launches the platform's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        webbrowser::open(url)
    }
}

/// Never launches anything, so the URL is always printed for manual use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBrowser;

impl Browser for NoBrowser {
    fn open(&self, _url: &str) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "browser launch disabled",
        ))
    }
}

/// Steps of one authorization attempt, used in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Idle,
    ServerStarted,
    BrowserLaunched,
    AwaitingCallback,
    CodeReceived,
    TokenExchanged,
    Done,
}

/// Browser-based authorization-code grant with a loopback redirect.
///
/// The flow talks to the network and the browser but never touches the
/// credential file; callers persist the returned grant.
#[derive(Clone)]
pub struct AuthorizationFlow {
    client: SpotifyClient,
    scopes: Vec<String>,
    scope_separator: String,
    redirect_host: String,
    redirect_port: u16,
    redirect_path: String,
    timeout: Option<Duration>,
    browser: Arc<dyn Browser>,
}

impl std::fmt::Debug for AuthorizationFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationFlow")
            .field("client", &self.client)
            .field("scopes", &self.scopes)
            .field("redirect_host", &self.redirect_host)
            .field("redirect_port", &self.redirect_port)
            .field("redirect_path", &self.redirect_path)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AuthorizationFlow {
    pub fn new(client: SpotifyClient, config: &AppConfig) -> Self {
        Self {
            client,
            scopes: config.scopes.clone(),
            scope_separator: config.scope_separator.clone(),
            redirect_host: config.redirect_host.clone(),
            redirect_port: config.redirect_port,
            redirect_path: config.redirect_path.clone(),
            timeout: config.login_timeout,
            browser: Arc::new(SystemBrowser),
        }
    }

    /// Replaces the browser launcher.
    #[must_use]
    pub fn with_browser(mut self, browser: impl Browser + 'static) -> Self {
        self.browser = Arc::new(browser);
        self
    }

    /// Overrides the requested scopes, e.g. with the ones a credential lists.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        if !scopes.is_empty() {
            self.scopes = scopes;
        }
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Runs the complete interactive authorization-code flow.
    ///
    /// # Authentication Flow
    ///
    /// 1. **Server Start**: binds the loopback callback server; a bind failure ends the attempt
    /// 2. **Browser Launch**: opens the authorize URL; if that fails the URL is printed for manual navigation
    /// 3. **Callback**: waits for the single redirect, bounded by the configured timeout
    /// 4. **Token Exchange**: exchanges the code at the token endpoint
    ///
    /// The callback server is stopped on every exit path.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Bind`] if the redirect port is taken
    /// - [`AuthError::Timeout`] if the user never completes the browser step
    /// - [`AuthError::StateMismatch`] for a forged or stale redirect
    /// - [`AuthError::AuthorizationDenied`] / [`AuthError::MissingCode`] for unusable callbacks
    /// - [`AuthError::TokenExchange`] if the token endpoint rejects the code
    pub async fn authorize(&self, client: &ClientCredentials) -> Result<TokenGrant, AuthError> {
        tracing::debug!(stage = ?FlowStage::Idle, "starting authorization");

        let nonce = utils::generate_state();
        let mut server = CallbackServer::start(
            &self.redirect_host,
            self.redirect_port,
            &self.redirect_path,
            &nonce,
        )
        .await?;
        tracing::debug!(stage = ?FlowStage::ServerStarted, redirect_uri = server.redirect_uri());

        let state = AuthorizationState {
            nonce,
            redirect_uri: server.redirect_uri().to_string(),
            path: self.redirect_path.clone(),
        };
        let authorize_url = self.authorize_url(&client.id, &state)?;

        self.launch_browser(authorize_url.as_str());
        tracing::debug!(stage = ?FlowStage::BrowserLaunched);

        let spinner = waiting_spinner();
        tracing::debug!(stage = ?FlowStage::AwaitingCallback, timeout = ?self.timeout);
        let callback = server.wait(self.timeout).await;
        spinner.finish_and_clear();

        let code = callback?.into_code()?;
        tracing::debug!(stage = ?FlowStage::CodeReceived);

        let grant = self
            .exchange_code(client, &code, &state.redirect_uri)
            .await?;
        tracing::debug!(stage = ?FlowStage::TokenExchanged, expires_in = grant.expires_in);
        tracing::debug!(stage = ?FlowStage::Done);

        Ok(grant)
    }

    /// Builds the authorize URL for one attempt.
    pub fn authorize_url(
        &self,
        client_id: &str,
        state: &AuthorizationState,
    ) -> Result<Url, AuthError> {
        let scope = self.scopes.join(&self.scope_separator);
        Url::parse_with_params(
            self.client.auth_url(),
            &[
                ("client_id", client_id),
                ("response_type", "code"),
                ("redirect_uri", state.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state.nonce.as_str()),
            ],
        )
        .map_err(|e| AuthError::Config(format!("invalid authorize URL {:?}: {e}", self.client.auth_url())))
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// Sends a form-encoded `grant_type=authorization_code` request with the
    /// code and the redirect URI used for this attempt, authenticating the
    /// client with HTTP Basic.
    ///
    /// # Errors
    ///
    /// [`AuthError::TokenExchange`] with the upstream payload for any non-2xx
    /// answer or an unreadable token response; [`AuthError::Http`] if the
    /// endpoint cannot be reached.
    pub async fn exchange_code(
        &self,
        client: &ClientCredentials,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, AuthError> {
        let (status, payload) = self
            .post_token_form(
                client,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", redirect_uri),
                ],
                "token exchange",
            )
            .await?;

        parse_grant(status, payload).map_err(|(status, payload)| AuthError::TokenExchange {
            status,
            payload,
        })
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// Spotify may or may not rotate the refresh token; a grant without one
    /// means the old refresh token is still valid.
    ///
    /// # Errors
    ///
    /// [`AuthError::Refresh`] with the upstream payload when the grant is
    /// rejected; [`AuthError::Http`] if the endpoint cannot be reached.
    pub async fn refresh(
        &self,
        client: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<TokenGrant, AuthError> {
        let (status, payload) = self
            .post_token_form(
                client,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                ],
                "token refresh",
            )
            .await?;

        parse_grant(status, payload)
            .map_err(|(status, payload)| AuthError::Refresh { status, payload })
    }

    async fn post_token_form(
        &self,
        client: &ClientCredentials,
        form: &[(&str, &str)],
        operation: &'static str,
    ) -> Result<(StatusCode, String), AuthError> {
        let response = self
            .client
            .http()
            .post(self.client.token_url())
            .header(
                AUTHORIZATION,
                utils::basic_auth_header(&client.id, &client.secret),
            )
            .form(form)
            .send()
            .await
            .map_err(|source| AuthError::Http { operation, source })?;

        let status = response.status();
        let payload = response
            .text()
            .await
            .map_err(|source| AuthError::Http { operation, source })?;

        tracing::debug!(operation, %status, "token endpoint answered");
        Ok((status, payload))
    }

    fn launch_browser(&self, url: &str) {
        info!("You will now be taken to your browser for authentication.");
        if let Err(e) = self.browser.open(url) {
            tracing::warn!(error = %e, "could not open browser");
            warning!(
                "Failed to open browser. Please navigate to the following URL manually:\n{}",
                url
            );
        }
    }
}

fn parse_grant(status: StatusCode, payload: String) -> Result<TokenGrant, (StatusCode, String)> {
    if !status.is_success() {
        return Err((status, payload));
    }
    match serde_json::from_str::<TokenGrant>(&payload) {
        Ok(grant) => Ok(grant),
        Err(e) => {
            tracing::warn!(error = %e, "token endpoint returned an unreadable grant");
            Err((status, payload))
        }
    }
}

fn waiting_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message("Waiting for authorization in the browser...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb
}

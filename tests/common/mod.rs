#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Form, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use karaoke::{config::AppConfig, spotify::auth::Browser};
use tokio::net::TcpListener;
use url::Url;

/// Serves `app` on an ephemeral loopback port and returns its base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A request received by [`FakeTokenEndpoint`].
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub authorization: Option<String>,
    pub form: HashMap<String, String>,
}

impl TokenRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }
}

#[derive(Clone)]
struct TokenState {
    exchange: (StatusCode, String),
    refresh: (StatusCode, String),
    requests: Arc<Mutex<Vec<TokenRequest>>>,
}

/// Accounts-service token endpoint answering both grant types with canned
/// responses.
pub struct FakeTokenEndpoint {
    pub url: String,
    requests: Arc<Mutex<Vec<TokenRequest>>>,
}

impl FakeTokenEndpoint {
    pub async fn start(exchange: (u16, &str), refresh: (u16, &str)) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = TokenState {
            exchange: (StatusCode::from_u16(exchange.0).unwrap(), exchange.1.to_string()),
            refresh: (StatusCode::from_u16(refresh.0).unwrap(), refresh.1.to_string()),
            requests: Arc::clone(&requests),
        };
        let app = Router::new()
            .route("/api/token", post(token))
            .with_state(state);
        let base = serve(app).await;

        Self {
            url: format!("{base}/api/token"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<TokenRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn token(
    State(state): State<TokenState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let (status, body) = match form.get("grant_type").map(String::as_str) {
        Some("refresh_token") => state.refresh.clone(),
        _ => state.exchange.clone(),
    };
    state
        .requests
        .lock()
        .unwrap()
        .push(TokenRequest { authorization, form });

    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

/// Web API answering `/me/player/currently-playing` with a canned response.
pub async fn fake_player_api(status: u16, body: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&seen);
    let status = StatusCode::from_u16(status).unwrap();

    let app = Router::new().route(
        "/me/player/currently-playing",
        get(move |headers: HeaderMap| {
            let recorded = Arc::clone(&recorded);
            async move {
                if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
                    recorded.lock().unwrap().push(auth.to_string());
                }
                (status, [(header::CONTENT_TYPE, "application/json")], body)
            }
        }),
    );

    (serve(app).await, seen)
}

/// Stands in for the user: when asked to open the authorize URL it follows
/// the redirect back to the callback server with a fixed code.
#[derive(Clone, Default)]
pub struct ScriptedBrowser {
    pub code: String,
    /// Replace the `state` the provider would echo back.
    pub forged_state: Option<String>,
    /// Report a launch failure after "the user" opened the URL by hand.
    pub fail_launch: bool,
    pub opened: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBrowser {
    pub fn with_code(code: &str) -> Self {
        Self {
            code: code.to_string(),
            ..Self::default()
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl Browser for ScriptedBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        self.opened.lock().unwrap().push(url.to_string());

        let params: HashMap<String, String> = Url::parse(url)
            .map_err(std::io::Error::other)?
            .query_pairs()
            .into_owned()
            .collect();
        let mut callback = Url::parse(&params["redirect_uri"]).map_err(std::io::Error::other)?;
        let state = self
            .forged_state
            .clone()
            .unwrap_or_else(|| params["state"].clone());
        callback
            .query_pairs_mut()
            .append_pair("code", &self.code)
            .append_pair("state", &state);

        tokio::spawn(async move {
            let _ = reqwest::get(callback).await;
        });

        if self.fail_launch {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no browser installed",
            ));
        }
        Ok(())
    }
}

/// Configuration pointing at local fakes, with an ephemeral redirect port.
pub fn test_config(token_url: &str, api_url: &str, credentials_path: PathBuf) -> AppConfig {
    AppConfig {
        auth_url: "https://accounts.example.test/authorize".to_string(),
        token_url: token_url.to_string(),
        api_url: api_url.to_string(),
        redirect_port: 0,
        login_timeout: Some(Duration::from_secs(5)),
        http_timeout: Duration::from_secs(5),
        expiry_margin: Duration::ZERO,
        credentials_path,
        ..AppConfig::default()
    }
}

pub const GRANT: &str = r#"{
    "access_token": "AT-new",
    "token_type": "Bearer",
    "scope": "user-read-playback-state user-read-currently-playing",
    "expires_in": 3600,
    "refresh_token": "RT-new"
}"#;

pub const REFRESHED: &str = r#"{
    "access_token": "AT-refreshed",
    "token_type": "Bearer",
    "expires_in": 3600
}"#;

pub const INVALID_GRANT: &str =
    r#"{"error":"invalid_grant","error_description":"Refresh token revoked"}"#;

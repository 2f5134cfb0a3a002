use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    config::{ENV_ACCESS_TOKEN, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_REFRESH_TOKEN, EnvVars},
    error::AuthError,
    management::CredentialStore,
    types::Credential,
};

/// One provider of credential fields.
///
/// Sources are evaluated in the order they are listed; none of them keeps
/// state between lookups.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// A user-supplied TOML file. It must exist and parse.
    File(PathBuf),
    /// `SPOTIFY_*` variables from an environment snapshot.
    Env(EnvVars),
    /// The record persisted by earlier logins. Missing means empty.
    Store(CredentialStore),
    /// Fixed fallback values, typically the configured scopes.
    Defaults(Credential),
}

impl CredentialSource {
    pub fn name(&self) -> &'static str {
        match self {
            CredentialSource::File(_) => "file",
            CredentialSource::Env(_) => "environment",
            CredentialSource::Store(_) => "store",
            CredentialSource::Defaults(_) => "defaults",
        }
    }

    /// The fields this source knows about.
    pub async fn lookup(&self) -> Result<Credential, AuthError> {
        match self {
            CredentialSource::File(path) => read_credentials_file(path).await,
            CredentialSource::Env(env) => Ok(from_env(env)),
            CredentialSource::Store(store) => Ok(store.load().await?.unwrap_or_default()),
            CredentialSource::Defaults(credential) => Ok(credential.clone()),
        }
    }
}

/// Merges credential fields from an ordered list of sources.
///
/// For each field the first source that sets it wins; later sources only
/// fill gaps. Fields nobody sets stay empty. An error from any source aborts
/// resolution.
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    sources: Vec<CredentialSource>,
}

impl CredentialResolver {
    pub fn new(sources: Vec<CredentialSource>) -> Self {
        Self { sources }
    }

    /// The chain the CLI uses: explicit file (if any), environment, the
    /// persisted store, then `defaults`.
    pub fn standard(
        explicit_file: Option<PathBuf>,
        env: EnvVars,
        store: CredentialStore,
        defaults: Credential,
    ) -> Self {
        let mut sources = Vec::with_capacity(4);
        if let Some(path) = explicit_file {
            sources.push(CredentialSource::File(path));
        }
        sources.push(CredentialSource::Env(env));
        sources.push(CredentialSource::Store(store));
        sources.push(CredentialSource::Defaults(defaults));
        Self { sources }
    }

    pub fn sources(&self) -> &[CredentialSource] {
        &self.sources
    }

    pub async fn resolve(&self) -> Result<Credential, AuthError> {
        resolve(&self.sources).await
    }

    /// Scopes to ask for in a new authorization.
    ///
    /// The persisted record only describes what an earlier grant covered, so
    /// it is skipped: the first non-empty list from any other source wins.
    /// Empty means "use the configured scopes".
    pub async fn requested_scopes(&self) -> Result<Vec<String>, AuthError> {
        for source in &self.sources {
            if matches!(source, CredentialSource::Store(_)) {
                continue;
            }
            let scopes = source.lookup().await?.scopes;
            if !scopes.is_empty() {
                return Ok(scopes);
            }
        }
        Ok(Vec::new())
    }
}

pub async fn resolve(sources: &[CredentialSource]) -> Result<Credential, AuthError> {
    let mut merged = Credential::default();
    for source in sources {
        let found = source.lookup().await?;
        tracing::trace!(
            source = source.name(),
            client_id = found.client_id.is_some(),
            access_token = found.access_token.is_some(),
            refresh_token = found.refresh_token.is_some(),
            "credential source consulted"
        );
        merged.fill_from(found);
    }
    Ok(merged)
}

fn from_env(env: &EnvVars) -> Credential {
    let owned = |key: &str| env.get(key).map(str::to_string);
    Credential {
        client_id: owned(ENV_CLIENT_ID),
        client_secret: owned(ENV_CLIENT_SECRET),
        access_token: owned(ENV_ACCESS_TOKEN),
        refresh_token: owned(ENV_REFRESH_TOKEN),
        expires_at: None,
        scopes: Vec::new(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CredentialsFile {
    spotify_client_id: Option<String>,
    spotify_client_secret: Option<String>,
    spotify_access_token: Option<String>,
    spotify_refresh_token: Option<String>,
    /// Native TOML datetime or an RFC 3339 string.
    spotify_token_expiry: Option<toml::Value>,
    #[serde(default)]
    spotify_scopes: Vec<String>,
}

impl TryFrom<CredentialsFile> for Credential {
    type Error = String;

    fn try_from(file: CredentialsFile) -> Result<Self, Self::Error> {
        let expires_at = file.spotify_token_expiry.map(parse_expiry).transpose()?;
        Ok(Credential {
            client_id: file.spotify_client_id,
            client_secret: file.spotify_client_secret,
            access_token: file.spotify_access_token,
            refresh_token: file.spotify_refresh_token,
            expires_at,
            scopes: file.spotify_scopes,
        })
    }
}

fn parse_expiry(value: toml::Value) -> Result<DateTime<Utc>, String> {
    let raw = match value {
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::String(s) => s,
        other => {
            return Err(format!(
                "spotify-token-expiry must be a datetime, got {}",
                other.type_str()
            ));
        }
    };

    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| format!("spotify-token-expiry {raw:?} is not an RFC 3339 timestamp with offset: {e}"))
}

async fn read_credentials_file(path: &Path) -> Result<Credential, AuthError> {
    let content = async_fs::read_to_string(path)
        .await
        .map_err(|source| AuthError::Io {
            operation: if source.kind() == ErrorKind::NotFound {
                "find credentials file"
            } else {
                "read credentials file"
            },
            path: path.to_path_buf(),
            source,
        })?;

    let decode_error = |reason: String| AuthError::Decode {
        path: path.to_path_buf(),
        reason,
    };
    let file: CredentialsFile =
        toml::from_str(&content).map_err(|e| decode_error(e.message().to_string()))?;
    Credential::try_from(file).map_err(decode_error)
}

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::{error::AuthError, types::Credential};

/// Reads and writes the persisted credential record.
///
/// The record is a JSON file at a fixed, user-scoped path. Writes go to a
/// sibling temporary file that is renamed into place, so a reader never
/// observes a half-written record. On unix the file is only readable by the
/// owning user.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted credential, or `None` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// [`AuthError::Io`] for any read failure other than a missing file,
    /// [`AuthError::Decode`] if the file is not a credential record.
    pub async fn load(&self) -> Result<Option<Credential>, AuthError> {
        let content = match async_fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no persisted credential");
                return Ok(None);
            }
            Err(source) => {
                return Err(AuthError::Io {
                    operation: "read credential file",
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let credential = serde_json::from_str(&content).map_err(|e| AuthError::Decode {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        tracing::debug!(path = %self.path.display(), "loaded persisted credential");
        Ok(Some(credential))
    }

    /// Replaces the persisted record with `credential`.
    pub async fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|source| AuthError::Io {
                    operation: "create directory",
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let json = serde_json::to_string_pretty(credential)?;
        let tmp = self.temp_path();

        match async_fs::remove_file(&tmp).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(io_error("remove stale temporary file", &tmp, source)),
        }

        create_private(&tmp)
            .await
            .map_err(|source| io_error("create temporary file", &tmp, source))?;
        async_fs::write(&tmp, json)
            .await
            .map_err(|source| io_error("write temporary file", &tmp, source))?;
        async_fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| io_error("replace credential file", &self.path, source))?;

        tracing::debug!(path = %self.path.display(), "saved credential");
        Ok(())
    }

    /// Deletes the persisted record. Deleting a missing record succeeds.
    pub async fn clear(&self) -> Result<(), AuthError> {
        match async_fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error("remove credential file", &self.path, source)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "credentials".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn io_error(operation: &'static str, path: &Path, source: std::io::Error) -> AuthError {
    AuthError::Io {
        operation,
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(unix)]
async fn create_private(path: &Path) -> std::io::Result<()> {
    use async_fs::unix::OpenOptionsExt;

    async_fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .await
        .map(drop)
}

#[cfg(not(unix))]
async fn create_private(path: &Path) -> std::io::Result<()> {
    async_fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map(drop)
}

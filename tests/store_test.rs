use chrono::{TimeZone, Utc};
use karaoke::{AuthError, management::CredentialStore, types::Credential};

fn sample() -> Credential {
    Credential {
        client_id: Some("client".into()),
        client_secret: Some("secret".into()),
        access_token: Some("AT".into()),
        refresh_token: Some("RT".into()),
        expires_at: Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
        scopes: vec!["user-read-playback-state".into()],
    }
}

#[tokio::test]
async fn test_save_then_load_returns_same_credential() {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("nested/credentials.json"));

    store.save(&sample()).await.unwrap();

    assert_eq!(store.load().await.unwrap(), Some(sample()));
}

#[tokio::test]
async fn test_save_replaces_previous_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("credentials.json"));
    store.save(&sample()).await.unwrap();

    let replacement = Credential {
        access_token: Some("AT2".into()),
        refresh_token: None,
        ..sample()
    };
    store.save(&replacement).await.unwrap();

    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded.access_token.as_deref(), Some("AT2"));
    assert_eq!(loaded.refresh_token, None);
    assert!(!dir.path().join("credentials.json.tmp").exists());
}

#[tokio::test]
async fn test_load_missing_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("absent.json"));

    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_load_corrupt_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = CredentialStore::new(&path).load().await.unwrap_err();

    assert!(matches!(err, AuthError::Decode { path: p, .. } if p == path));
}

#[tokio::test]
async fn test_load_directory_is_io_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = CredentialStore::new(dir.path()).load().await.unwrap_err();

    assert!(matches!(err, AuthError::Io { .. }), "{err:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn test_saved_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    CredentialStore::new(&path).save(&sample()).await.unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("credentials.json"));
    store.save(&sample()).await.unwrap();

    store.clear().await.unwrap();
    store.clear().await.unwrap();

    assert_eq!(store.load().await.unwrap(), None);
}

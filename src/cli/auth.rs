use chrono::{Duration, Utc};
use tabled::Table;

use crate::{
    cli::{CommandContext, exit_with, interruptible},
    info, success,
    types::CredentialTableRow,
    utils, warning,
};

/// Logs in through the browser and saves the new credential.
pub async fn login(ctx: &CommandContext) {
    let mut manager = match ctx.manager() {
        Ok(manager) => manager,
        Err(e) => exit_with(&e),
    };

    match interruptible(manager.login()).await {
        Ok(credential) => {
            success!("Authenticated");
            info!(
                "Access token expires {}.",
                utils::describe_expiry(credential.expires_at, Utc::now())
            );
        }
        Err(e) => exit_with(&e),
    }
}

/// Shows the resolved credential with secrets masked. Never calls Spotify.
pub async fn status(ctx: &CommandContext) {
    let credential = match ctx.resolver().resolve().await {
        Ok(credential) => credential,
        Err(e) => exit_with(&e),
    };

    let now = Utc::now();
    let margin = Duration::from_std(ctx.config.expiry_margin).unwrap_or_else(|_| Duration::zero());
    let masked = |value: &Option<String>| {
        value
            .as_deref()
            .map(utils::mask)
            .unwrap_or_else(|| "-".to_string())
    };

    let state = match (&credential.access_token, &credential.refresh_token) {
        (None, _) => "not logged in",
        (Some(_), Some(_)) if credential.expires_at.is_none() => "expiry unknown, refresh on next use",
        (Some(_), Some(_)) if credential.is_expired_at(now, margin) => "expired, refresh on next use",
        (Some(_), None) if credential.is_expired_at(now, margin) => "expired, login required",
        (Some(_), _) => "valid",
    };

    let rows = vec![
        row("client id", credential.client_id.clone().unwrap_or_else(|| "-".into())),
        row("client secret", masked(&credential.client_secret)),
        row("access token", masked(&credential.access_token)),
        row("refresh token", masked(&credential.refresh_token)),
        row("expires", utils::describe_expiry(credential.expires_at, now)),
        row("scopes", credential.scopes.join(" ")),
        row("state", state.to_string()),
        row("stored at", ctx.config.credentials_path.display().to_string()),
    ];
    println!("{}", Table::new(rows));

    if credential.client_id.is_none() || credential.client_secret.is_none() {
        warning!("Client id or secret missing. Set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET or pass --credentials.");
    }
}

/// Deletes the saved credential.
pub async fn logout(ctx: &CommandContext) {
    let mut manager = match ctx.manager() {
        Ok(manager) => manager,
        Err(e) => exit_with(&e),
    };

    match manager.logout().await {
        Ok(()) => success!("Removed saved credentials from {}", ctx.config.credentials_path.display()),
        Err(e) => exit_with(&e),
    }
}

fn row(field: &str, value: String) -> CredentialTableRow {
    CredentialTableRow {
        field: field.to_string(),
        value,
    }
}

use std::time::Duration;

use colored::Colorize;

use crate::{
    cli::{CommandContext, exit_with, interruptible, pause},
    error::AuthError,
    info,
    management::TokenLifecycleManager,
    spotify::{SpotifyClient, player},
    types::{CurrentlyPlaying, Session},
    utils, warning,
};

/// Pause after the current track ends before asking for the next one.
const NEXT_TRACK_DELAY: Duration = Duration::from_secs(2);

/// Prints the track currently playing.
///
/// Authenticates first: a valid stored token is used as is, an expired one is
/// refreshed, and if that fails the browser login runs again. With `follow`
/// the command waits for the current track to end and prints the next one.
pub async fn now_playing(ctx: &CommandContext, follow: bool) {
    let mut manager = match ctx.manager() {
        Ok(manager) => manager,
        Err(e) => exit_with(&e),
    };
    let spotify = match ctx.spotify() {
        Ok(spotify) => spotify,
        Err(e) => exit_with(&e),
    };

    let token = match authenticated_token(&mut manager).await {
        Ok(token) => token,
        Err(e) => exit_with(&e),
    };

    let playing = match fetch(&spotify, &token).await {
        Some(playing) => playing,
        None => return,
    };

    if !follow {
        return;
    }

    let remaining = match (&playing.item, playing.progress_ms) {
        (Some(item), Some(progress)) => item.duration_ms.saturating_sub(progress),
        _ => return,
    };
    if !pause(Duration::from_millis(remaining) + NEXT_TRACK_DELAY).await {
        return;
    }

    // The token may have expired while the track was playing.
    let token = match authenticated_token(&mut manager).await {
        Ok(token) => token,
        Err(e) => exit_with(&e),
    };
    fetch(&spotify, &token).await;
}

async fn authenticated_token(manager: &mut TokenLifecycleManager) -> Result<String, AuthError> {
    let credential = match manager.ensure_authenticated().await? {
        Session::Authenticated(credential) => credential,
        Session::ReauthenticationRequired(reason) => {
            warning!("Saved credentials can no longer be used ({}). Logging in again.", reason);
            interruptible(manager.login()).await?
        }
    };

    credential
        .access_token
        .ok_or(AuthError::MissingCredential("access token"))
}

async fn fetch(spotify: &SpotifyClient, token: &str) -> Option<CurrentlyPlaying> {
    match player::currently_playing(spotify, token).await {
        Ok(Some(playing)) => {
            print_playing(&playing);
            Some(playing)
        }
        Ok(None) => {
            info!("Nothing is playing right now.");
            None
        }
        Err(e) => exit_with(&e),
    }
}

fn print_playing(playing: &CurrentlyPlaying) {
    let Some(item) = &playing.item else {
        info!("Something is playing, but it is not a track.");
        return;
    };

    let artists = item
        .artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let progress = utils::format_duration_ms(playing.progress_ms.unwrap_or_default());
    let duration = utils::format_duration_ms(item.duration_ms);
    let paused = if playing.is_playing { "" } else { " (paused)" };

    println!(
        "{}",
        format!("{} - {} | {}/{}{}", item.name, artists, progress, duration, paused).yellow()
    );
}

use reqwest::StatusCode;

use crate::{
    error::AuthError,
    spotify::SpotifyClient,
    types::{ApiErrorResponse, CurrentlyPlaying},
};

/// Fetches the track currently playing for the authenticated user.
///
/// # Returns
///
/// - `Ok(Some(_))` - playback state with the current item
/// - `Ok(None)` - nothing is playing (Spotify answers `204 No Content`)
///
/// # Errors
///
/// [`AuthError::Api`] when Spotify answers with an error object (expired
/// token, missing scope, rate limiting); [`AuthError::Http`] for transport
/// failures.
pub async fn currently_playing(
    client: &SpotifyClient,
    access_token: &str,
) -> Result<Option<CurrentlyPlaying>, AuthError> {
    let url = format!("{}/me/player/currently-playing", client.api_url());
    tracing::debug!(%url, "fetching currently playing track");

    let response = client
        .http()
        .get(&url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|source| AuthError::Http {
            operation: "fetch currently playing",
            source,
        })?;

    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        tracing::info!("playback not available or active");
        return Ok(None);
    }

    if status.is_success() {
        let playing = response
            .json::<CurrentlyPlaying>()
            .await
            .map_err(|source| AuthError::Http {
                operation: "decode currently playing",
                source,
            })?;
        return Ok(Some(playing));
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    Err(AuthError::Api { status, message })
}

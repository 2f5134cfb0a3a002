use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};

/// Length of the per-attempt `state` nonce.
pub const STATE_LENGTH: usize = 32;

/// Generates a fresh random `state` nonce for one authorization attempt.
pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

/// `Authorization` header value for client authentication at the token endpoint.
pub fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    let raw = format!("{client_id}:{client_secret}");
    format!("Basic {}", STANDARD.encode(raw))
}

const MASK: &str = "****";

/// Hides a secret behind a fixed-width mask, keeping its last four
/// characters. Secrets of four characters or fewer are hidden entirely.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return MASK.to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{MASK}{tail}")
}

/// Formats milliseconds as `m:ss`.
pub fn format_duration_ms(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Human-readable relative expiry, e.g. `in 42m` or `3h ago`.
pub fn describe_expiry(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = expires_at else {
        return "unknown".to_string();
    };

    let delta = at - now;
    let minutes = delta.num_minutes().abs();
    let span = if minutes >= 60 {
        format!("{}h", minutes / 60)
    } else {
        format!("{minutes}m")
    };

    if delta.num_seconds() >= 0 {
        format!("{} (in {span})", at.to_rfc3339())
    } else {
        format!("{} ({span} ago)", at.to_rfc3339())
    }
}

use std::collections::HashSet;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{Duration, TimeZone, Utc};
use karaoke::utils::*;

#[test]
fn test_generate_state() {
    let state = generate_state();

    assert_eq!(state.len(), STATE_LENGTH);
    assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[test]
fn test_generate_state_is_unique_per_attempt() {
    let states: HashSet<String> = (0..100).map(|_| generate_state()).collect();
    assert_eq!(states.len(), 100);
}

#[test]
fn test_basic_auth_header() {
    let header = basic_auth_header("client", "s3cret");

    let encoded = header.strip_prefix("Basic ").unwrap();
    let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
    assert_eq!(decoded, "client:s3cret");
}

#[test]
fn test_mask_keeps_last_four_characters() {
    assert_eq!(mask("abcdefgh"), "****efgh");
    assert_eq!(mask("abcd"), "****");
}

#[test]
fn test_mask_does_not_reveal_length() {
    assert_eq!(mask("abcdefghijklmnopqrstuvwxyz"), "****wxyz");
    assert_eq!(mask("ab"), mask("abcd"));
    assert_eq!(mask(""), "****");
}

#[test]
fn test_format_duration_ms() {
    assert_eq!(format_duration_ms(0), "0:00");
    assert_eq!(format_duration_ms(65_432), "1:05");
    assert_eq!(format_duration_ms(3_600_000), "60:00");
}

#[test]
fn test_describe_expiry() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    assert_eq!(describe_expiry(None, now), "unknown");

    let soon = describe_expiry(Some(now + Duration::minutes(42)), now);
    assert!(soon.ends_with("(in 42m)"), "{soon}");

    let past = describe_expiry(Some(now - Duration::hours(3)), now);
    assert!(past.ends_with("(3h ago)"), "{past}");
}

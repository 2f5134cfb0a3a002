use std::time::Duration;

use karaoke::{AuthError, server::CallbackServer};
use reqwest::StatusCode;
use tokio::net::TcpListener;

const STATE: &str = "expected-state";
const WAIT: Option<Duration> = Some(Duration::from_secs(5));

async fn start() -> CallbackServer {
    CallbackServer::start("127.0.0.1", 0, "/oauth/callback", STATE)
        .await
        .unwrap()
}

async fn hit(server: &CallbackServer, query: &str) -> reqwest::Result<StatusCode> {
    let url = format!("{}?{}", server.redirect_uri(), query);
    Ok(reqwest::get(url).await?.status())
}

#[tokio::test]
async fn test_redirect_uri_uses_bound_port() {
    let server = start().await;

    let port = server.local_addr().port();
    assert_ne!(port, 0);
    assert_eq!(
        server.redirect_uri(),
        format!("http://127.0.0.1:{port}/oauth/callback")
    );
}

#[tokio::test]
async fn test_delivers_code_for_matching_state() {
    let mut server = start().await;

    let status = hit(&server, &format!("code=ABC123&state={STATE}")).await.unwrap();
    let result = server.wait(WAIT).await.unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(result.code.as_deref(), Some("ABC123"));
    assert_eq!(result.into_code().unwrap(), "ABC123");
}

#[tokio::test]
async fn test_rejects_mismatched_state() {
    let mut server = start().await;

    let status = hit(&server, "code=ABC123&state=forged").await.unwrap();

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(matches!(server.wait(WAIT).await, Err(AuthError::StateMismatch)));
}

#[tokio::test]
async fn test_rejects_missing_state() {
    let mut server = start().await;

    let status = hit(&server, "code=ABC123").await.unwrap();

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(matches!(server.wait(WAIT).await, Err(AuthError::StateMismatch)));
}

#[tokio::test]
async fn test_provider_error_is_delivered_as_denial() {
    let mut server = start().await;

    let status = hit(
        &server,
        &format!("error=access_denied&error_description=User+said+no&state={STATE}"),
    )
    .await
    .unwrap();
    let result = server.wait(WAIT).await.unwrap();

    assert_eq!(status, StatusCode::BAD_REQUEST);
    match result.into_code() {
        Err(AuthError::AuthorizationDenied { error, description }) => {
            assert_eq!(error, "access_denied");
            assert_eq!(description.as_deref(), Some("User said no"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_callback_without_code_is_missing_code() {
    let mut server = start().await;

    hit(&server, &format!("state={STATE}")).await.unwrap();
    let result = server.wait(WAIT).await.unwrap();

    assert!(matches!(result.into_code(), Err(AuthError::MissingCode)));
}

#[tokio::test]
async fn test_duplicate_callbacks_deliver_once() {
    let mut server = start().await;
    let query = format!("code=ABC123&state={STATE}");

    let (first, second) = tokio::join!(hit(&server, &query), hit(&server, &query));
    let delivered = server.wait(WAIT).await.unwrap();

    // A late duplicate is either answered with 409 or finds the server gone.
    let statuses: Vec<StatusCode> = [first, second].into_iter().flatten().collect();
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert!(
        statuses
            .iter()
            .all(|s| *s == StatusCode::OK || *s == StatusCode::CONFLICT)
    );
    assert_eq!(delivered.code.as_deref(), Some("ABC123"));

    assert!(matches!(server.wait(WAIT).await, Err(AuthError::Cancelled)));
}

#[tokio::test]
async fn test_wait_times_out_and_releases_port() {
    let mut server = start().await;
    let addr = server.local_addr();

    let err = server
        .wait(Some(Duration::from_millis(100)))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Timeout(_)));
    assert!(err.is_recoverable());
    TcpListener::bind(addr).await.unwrap();
}

#[tokio::test]
async fn test_shutdown_twice_is_harmless() {
    let mut server = start().await;
    let handle = server.shutdown_handle();

    handle.trigger();
    server.shutdown().await.unwrap();
    server.shutdown().await.unwrap();
    handle.trigger();

    assert!(handle.is_triggered());
    assert!(matches!(server.wait(WAIT).await, Err(AuthError::Cancelled)));
}

#[tokio::test]
async fn test_external_stop_unblocks_wait() {
    let mut server = start().await;
    let handle = server.shutdown_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.trigger();
    });

    assert!(matches!(server.wait(None).await, Err(AuthError::Cancelled)));
}

#[tokio::test]
async fn test_bind_failure_when_port_taken() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let err = CallbackServer::start("127.0.0.1", port, "/oauth/callback", STATE)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Bind { .. }), "{err:?}");
    assert!(err.hint().unwrap().contains("KARAOKE_REDIRECT_PORT"));
}

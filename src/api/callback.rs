use std::{collections::HashMap, sync::Arc};

use axum::{Extension, extract::Query, http::StatusCode, response::Html};
use tokio::sync::{Mutex, oneshot};

use crate::{error::AuthError, server::ShutdownSignal, types::CallbackResult};

const SUCCESS_PAGE: &str = "<h2>Authentication successful.</h2><p>You can close this window and return to the CLI.</p>";
const FAILURE_PAGE: &str =
    "<h2>Authentication failed.</h2><p>Return to the CLI for details and run the login again.</p>";
const ALREADY_HANDLED_PAGE: &str =
    "<h4>This login attempt is already complete.</h4><p>You can close this window.</p>";

/// What the callback handler delivers to the waiting flow.
pub type CallbackOutcome = Result<CallbackResult, AuthError>;

/// Per-attempt state shared with the callback handler.
///
/// The sender is taken by the first request that reaches the handler, so at
/// most one outcome is ever delivered.
#[derive(Debug)]
pub struct CallbackSlot {
    expected_state: String,
    sender: Mutex<Option<oneshot::Sender<CallbackOutcome>>>,
    shutdown: ShutdownSignal,
}

impl CallbackSlot {
    pub fn new(
        expected_state: String,
        sender: oneshot::Sender<CallbackOutcome>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            expected_state,
            sender: Mutex::new(Some(sender)),
            shutdown,
        }
    }
}

pub async fn callback(
    Query(params): Query<HashMap<String, String>>,
    Extension(slot): Extension<Arc<CallbackSlot>>,
) -> (StatusCode, Html<&'static str>) {
    let Some(sender) = slot.sender.lock().await.take() else {
        tracing::debug!("ignoring repeated authorization callback");
        return (StatusCode::CONFLICT, Html(ALREADY_HANDLED_PAGE));
    };

    let (outcome, response) = match params.get("state") {
        Some(state) if *state == slot.expected_state => {
            let result = CallbackResult {
                code: params.get("code").cloned(),
                error: params.get("error").cloned(),
                error_description: params.get("error_description").cloned(),
            };
            let response = if result.error.is_none() && result.code.is_some() {
                (StatusCode::OK, Html(SUCCESS_PAGE))
            } else {
                (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE))
            };
            (Ok(result), response)
        }
        state => {
            tracing::warn!(
                state_present = state.is_some(),
                "authorization callback with unexpected state rejected"
            );
            (
                Err(AuthError::StateMismatch),
                (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE)),
            )
        }
    };

    if sender.send(outcome).is_err() {
        tracing::debug!("authorization callback arrived after the login stopped waiting");
    }
    slot.shutdown.trigger();

    response
}

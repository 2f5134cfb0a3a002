use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{Extension, Router, routing::get};
use tokio::{
    net::TcpListener,
    sync::{oneshot, watch},
    task::JoinHandle,
};

use crate::{
    api::{self, CallbackOutcome, CallbackSlot},
    error::AuthError,
    types::CallbackResult,
};

/// How long a graceful shutdown may take before the server task is aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Idempotent stop signal for a [`CallbackServer`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal(Arc<watch::Sender<bool>>);

impl ShutdownSignal {
    fn new() -> Self {
        Self(Arc::new(watch::Sender::new(false)))
    }

    /// Asks the server to stop. Calling it again has no effect.
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    async fn triggered(self) {
        let mut rx = self.0.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// One-shot loopback HTTP listener for the authorization redirect.
///
/// The server binds as soon as it is started, accepts exactly one callback
/// carrying the expected `state`, delivers it to [`CallbackServer::wait`] and
/// stops. Dropping the server also stops it.
#[derive(Debug)]
pub struct CallbackServer {
    redirect_uri: String,
    local_addr: SocketAddr,
    receiver: Option<oneshot::Receiver<CallbackOutcome>>,
    shutdown: ShutdownSignal,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl CallbackServer {
    /// Binds `host:port` and starts serving `path`.
    ///
    /// The returned redirect URI uses the port actually bound, so a port of
    /// `0` works too.
    ///
    /// # Errors
    ///
    /// [`AuthError::Bind`] if the address is unavailable.
    pub async fn start(
        host: &str,
        port: u16,
        path: &str,
        expected_state: &str,
    ) -> Result<Self, AuthError> {
        let bind_error = |source| AuthError::Bind {
            addr: format!("{host}:{port}"),
            source,
        };

        let listener = TcpListener::bind((host, port)).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        let redirect_uri = format!("http://{host}:{}{path}", local_addr.port());

        let (sender, receiver) = oneshot::channel();
        let shutdown = ShutdownSignal::new();
        let slot = Arc::new(CallbackSlot::new(
            expected_state.to_string(),
            sender,
            shutdown.clone(),
        ));

        let app = Router::new()
            .route(path, get(api::callback))
            .layer(Extension(slot));

        let stop = shutdown.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(stop.triggered())
                .await
        });

        tracing::debug!(%local_addr, %redirect_uri, "callback server listening");

        Ok(Self {
            redirect_uri,
            local_addr,
            receiver: Some(receiver),
            shutdown,
            task: Some(task),
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle that can stop the server from elsewhere, e.g. on Ctrl-C.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Waits for the single callback, then stops the server.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Timeout`] if `timeout` elapses first
    /// - [`AuthError::Cancelled`] if the server was stopped before a callback
    ///   arrived, or the result was already consumed
    /// - [`AuthError::StateMismatch`] if the callback carried a foreign state
    pub async fn wait(&mut self, timeout: Option<Duration>) -> Result<CallbackResult, AuthError> {
        let Some(receiver) = self.receiver.take() else {
            return Err(AuthError::Cancelled);
        };

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::debug!(timeout = ?limit, "gave up waiting for authorization callback");
                    self.stop_logged().await;
                    return Err(AuthError::Timeout(limit));
                }
            },
            None => receiver.await,
        };

        self.stop_logged().await;
        outcome.unwrap_or(Err(AuthError::Cancelled))
    }

    /// Stops the server and waits for it to release the port.
    ///
    /// Safe to call any number of times and concurrently with a request that
    /// is still being answered.
    pub async fn shutdown(&mut self) -> Result<(), AuthError> {
        self.shutdown.trigger();
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(Ok(()))) => {
                tracing::debug!(addr = %self.local_addr, "callback server stopped");
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(AuthError::Shutdown(e.to_string())),
            Ok(Err(e)) => Err(AuthError::Shutdown(e.to_string())),
            Err(_) => {
                task.abort();
                Err(AuthError::Shutdown(format!(
                    "server did not stop within {}s and was aborted",
                    SHUTDOWN_GRACE.as_secs()
                )))
            }
        }
    }

    async fn stop_logged(&mut self) {
        if let Err(e) = self.shutdown().await {
            tracing::error!(error = %e, "callback server did not shut down cleanly");
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

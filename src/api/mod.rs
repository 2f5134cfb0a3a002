//! # API Module
//!
//! HTTP endpoints served by the local callback server during a login.
//!
//! ## Endpoints
//!
//! - [`callback`] - receives the authorization redirect from Spotify, checks
//!   the `state` nonce against the login attempt that started it, and hands
//!   the single [`CallbackResult`](crate::types::CallbackResult) to the
//!   waiting flow. Any later request gets a static "already complete" page.
//!
//! The handler never exchanges the code itself; that stays with
//! [`crate::spotify::auth::AuthorizationFlow`], so the server has no network
//! side effects beyond answering the browser.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use axum::{Extension, Router, routing::get};
//! use karaoke::api::{CallbackSlot, callback};
//!
//! let app = Router::new()
//!     .route("/oauth/callback", get(callback))
//!     .layer(Extension(slot));
//! ```

mod callback;

pub use callback::{CallbackOutcome, CallbackSlot, callback};

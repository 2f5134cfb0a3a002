//! Karaoke
//!
//! Authenticates against the Spotify Web API with the OAuth 2.0 authorization
//! code flow, keeps the resulting tokens fresh, and reads what the user is
//! currently listening to.
//!
//! # Modules
//!
//! - `api` - handler for the loopback redirect endpoint
//! - `cli` - command implementations for the `karaoke` binary
//! - `config` - environment and configuration loading
//! - `error` - the [`AuthError`] type shared by every operation
//! - `management` - credential resolution, persistence and token lifecycle
//! - `server` - the short-lived loopback callback server
//! - `spotify` - Spotify accounts and Web API client
//! - `types` - credential, grant and player data structures
//! - `utils` - small helpers (state nonces, masking, formatting)

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod management;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

pub use error::AuthError;

/// Prints an informational message with a blue bullet point.
///
/// Accepts the same arguments as `println!`.
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits with code 1.
///
/// Only for failures the command cannot recover from; nothing after the
/// invocation runs.
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning with a yellow exclamation mark.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}

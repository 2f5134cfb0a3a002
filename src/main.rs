use std::path::PathBuf;

use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use karaoke::{
    cli::{self, CommandContext},
    config::{self, AppConfig, EnvVars},
    error,
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    /// TOML file with client credentials and tokens; takes precedence over
    /// the environment and the saved credential
    #[clap(long, global = true, value_name = "FILE")]
    credentials: Option<PathBuf>,

    /// Log level for diagnostics on stderr (error, warn, info, debug, trace)
    #[clap(long, global = true)]
    log_level: Option<String>,

    /// Print the authorization URL instead of opening a browser
    #[clap(long, global = true)]
    no_browser: bool,

    /// Seconds to wait for the browser login; 0 waits indefinitely
    #[clap(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage the Spotify login
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Show the track currently playing
    NowPlaying(NowPlayingOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// Log in through the browser and save the credential
    Login,

    /// Show the resolved credential with secrets masked
    Status,

    /// Delete the saved credential
    Logout,
}

#[derive(Parser, Debug, Clone)]
pub struct NowPlayingOptions {
    /// Wait for the current track to end and print the next one
    #[clap(long)]
    follow: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("karaoke={level},warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let verbose = matches!(level, "debug" | "trace");

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(verbose)
        .with_line_number(verbose)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let env = EnvVars::from_process();
    let config = match AppConfig::from_env(&env) {
        Ok(config) => config,
        Err(e) => error!("Invalid configuration. Err: {}", e),
    };

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_tracing(&level);

    let mut ctx = CommandContext::new(config, env);
    ctx.credentials_file = cli.credentials;
    ctx.no_browser = cli.no_browser;
    if let Some(secs) = cli.timeout {
        ctx.set_login_timeout(secs);
    }

    match cli.command {
        Command::Auth(AuthCommand::Login) => cli::login(&ctx).await,
        Command::Auth(AuthCommand::Status) => cli::status(&ctx).await,
        Command::Auth(AuthCommand::Logout) => cli::logout(&ctx).await,
        Command::NowPlaying(opt) => cli::now_playing(&ctx, opt.follow).await,
        Command::Completions(_) => {}
    }
}

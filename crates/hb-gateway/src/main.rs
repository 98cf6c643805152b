//! hookbot: HookBot main binary
//!
//! Runs a Discord bot with a demo command set and a logging hook.
//!
//! Usage:
//!   hookbot                    - Start the bot (config from ./hookbot.toml or env)
//!   hookbot --config <path>    - Start with an explicit config file
//!   hookbot --help             - Show help

mod commands;
mod hook;

use std::path::PathBuf;
use std::sync::Arc;

use hb_core::{Config, CredentialStore};
use hb_discord::DiscordBot;
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    Run { config: Option<PathBuf> },
    Help,
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = match parse_args()? {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("hookbot {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Run { config } => config,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = match &config_path {
        Some(path) => Config::from_toml_file(path),
        None => Config::load(),
    }
    .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting hookbot...");
    tracing::info!(
        "Prefix: {:?}, error style: {:?}",
        config.discord.prefix,
        config.discord.error_style
    );

    let mut bot = DiscordBot::new(&config, CredentialStore::process().clone())?;
    load_credential(&mut bot, &config);

    commands::register(&bot)?;
    bot.set_hook(Arc::new(hook::LoggingHook));

    // Wait for shutdown signal
    let handle = bot.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down...");
            if let Err(e) = handle.shutdown().await {
                tracing::warn!("Shutdown failed: {}", e);
            }
        }
    });

    tracing::info!("Press Ctrl+C to exit");
    bot.start(None).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Try the configured credential sources in order; the first one that
/// yields a token becomes the bot's credential
fn load_credential(bot: &mut DiscordBot, config: &Config) {
    for source in config.credential_sources() {
        match bot.credentials_mut().from_source(&source) {
            Ok(_) => {
                tracing::info!("Loaded Discord token from {}", source.label());
                return;
            }
            Err(e) => tracing::debug!("No token from {}: {}", source.label(), e),
        }
    }
    tracing::warn!("No configured token source succeeded; falling back to the shared store");
}

/// Parse command line arguments
fn parse_args() -> anyhow::Result<RunMode> {
    let mut args = std::env::args().skip(1);
    let mut config = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config needs a path"))?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            other => anyhow::bail!("Unknown argument: {}", other),
        }
    }

    Ok(RunMode::Run { config })
}

/// Print help message
fn print_help() {
    println!("hookbot - hook-driven Discord bot");
    println!();
    println!("Usage:");
    println!("  hookbot                  Start the bot");
    println!("  hookbot --config <path>  Read settings from <path> instead of ./hookbot.toml");
    println!("  hookbot --help           Show this help message");
    println!("  hookbot --version        Show version");
    println!();
    println!("Environment Variables:");
    println!("  DISCORD_BOT_TOKEN    Discord bot token");
    println!("  DISCORD_TOKEN_FILE   File containing the token");
    println!("  DISCORD_PREFIX       Prefix for text commands (default: !)");
    println!("  DISCORD_ERROR_STYLE  plain or embed (default: plain)");
    println!("  VOICE_TIMEOUT_SECS   Voice operation timeout (default: 10)");
    println!("  RUST_LOG             Log filter (default: info)");
}

//! Error types for hb-discord

use serenity::model::id::GuildId;
use thiserror::Error;

use crate::commands::CommandKind;

/// hb-discord error type
#[derive(Error, Debug)]
pub enum DiscordError {
    #[error(transparent)]
    Credential(#[from] hb_core::Error),

    #[error("Invalid command prefix {0:?}")]
    InvalidPrefix(String),

    #[error("Invalid command definition: {0}")]
    InvalidCommand(String),

    #[error("A {kind} command named '{name}' is already registered")]
    DuplicateCommand { kind: CommandKind, name: String },

    #[error("{0} commands are disabled for this bot")]
    StyleDisabled(CommandKind),

    #[error("Another voice operation is in progress for guild {0}")]
    Busy(GuildId),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Voice error: {0}")]
    Voice(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("No Discord session is running")]
    NotRunning,

    #[error("Serenity error: {0}")]
    Serenity(#[from] serenity::Error),
}

impl DiscordError {
    /// Whether retrying the same call later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_) | Self::Timeout(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DiscordError>;

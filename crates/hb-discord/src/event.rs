//! Gateway events as seen by the dispatcher
//!
//! These are decoupled from serenity's models so the dispatcher can be
//! driven by any gateway client (and by tests).

use serenity::model::id::{ChannelId, GuildId, InteractionId, MessageId, UserId};

use crate::commands::CommandOption;

/// Identity the session logged in with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyInfo {
    pub user_id: UserId,
    pub user_name: String,
    pub guild_count: usize,
}

/// A text message delivered by the gateway
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub author_id: UserId,
    pub author_name: String,
    pub content: String,
}

/// What kind of interaction arrived
#[derive(Debug, Clone)]
pub enum InteractionKind {
    /// Structured (slash) command invocation
    Command {
        name: String,
        options: Vec<CommandOption>,
    },
    Autocomplete {
        name: String,
    },
    Component {
        custom_id: String,
    },
    Modal {
        custom_id: String,
    },
}

/// An interaction delivered by the gateway
#[derive(Debug, Clone)]
pub struct InboundInteraction {
    pub id: InteractionId,
    pub token: String,
    pub kind: InteractionKind,
    pub channel_id: Option<ChannelId>,
    pub guild_id: Option<GuildId>,
    pub user_id: UserId,
}

/// Why a session stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Connection closed (shutdown, reboot, network drop)
    Closed,
    /// Session terminated by an error
    Error(String),
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => f.write_str("connection closed"),
            Self::Error(e) => write!(f, "error: {}", e),
        }
    }
}

//! Outbound half of the gateway client
//!
//! The dispatcher only needs two things from the platform: publishing the
//! interaction command tree and answering whoever invoked a command.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, InteractionId, MessageId};

use crate::commands::CommandSpec;
use crate::error::Result;

/// Where a command was invoked; replies go back there
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Message {
        channel_id: ChannelId,
        message_id: MessageId,
    },
    Interaction {
        interaction_id: InteractionId,
        token: String,
    },
}

/// Content sent back to the invoking context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// Rendered as a red embed
    Error { title: String, description: String },
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Replace the remote interaction command tree, returning how many
    /// commands the platform accepted
    async fn sync_commands(&self, commands: &[CommandSpec]) -> Result<usize>;

    /// Answer the invoking context
    ///
    /// `followup` is set once the interaction has already been answered.
    async fn reply(&self, origin: &Origin, reply: &Reply, followup: bool) -> Result<()>;
}

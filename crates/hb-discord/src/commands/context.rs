use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serenity::model::id::{ChannelId, GuildId, UserId};

use super::{CommandKind, CommandOption, OptionValue};
use crate::error::{DiscordError, Result};
use crate::event::{InboundInteraction, InboundMessage};
use crate::gateway::{GatewayClient, Origin, Reply};

/// Everything a handler knows about one invocation
#[derive(Clone)]
pub struct CommandContext {
    pub kind: CommandKind,
    pub name: String,
    /// Text after the command name (prefix commands only)
    pub args: String,
    /// Typed parameters (interaction commands only)
    pub options: Vec<CommandOption>,
    pub author_id: UserId,
    pub channel_id: Option<ChannelId>,
    pub guild_id: Option<GuildId>,
    origin: Origin,
    gateway: Arc<dyn GatewayClient>,
    /// Bound for each reply sent through the gateway
    timeout: Duration,
    responded: Arc<AtomicBool>,
}

impl CommandContext {
    pub(crate) fn from_message(
        message: &InboundMessage,
        name: &str,
        args: &str,
        gateway: Arc<dyn GatewayClient>,
        timeout: Duration,
    ) -> Self {
        Self {
            kind: CommandKind::Prefix,
            name: name.to_string(),
            args: args.to_string(),
            options: Vec::new(),
            author_id: message.author_id,
            channel_id: Some(message.channel_id),
            guild_id: message.guild_id,
            origin: Origin::Message {
                channel_id: message.channel_id,
                message_id: message.id,
            },
            gateway,
            timeout,
            responded: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn from_interaction(
        interaction: &InboundInteraction,
        name: &str,
        options: &[CommandOption],
        gateway: Arc<dyn GatewayClient>,
        timeout: Duration,
    ) -> Self {
        Self {
            kind: CommandKind::Interaction,
            name: name.to_string(),
            args: String::new(),
            options: options.to_vec(),
            author_id: interaction.user_id,
            channel_id: interaction.channel_id,
            guild_id: interaction.guild_id,
            origin: Origin::Interaction {
                interaction_id: interaction.id,
                token: interaction.token.clone(),
            },
            gateway,
            timeout,
            responded: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Whether anything has been sent back yet
    pub fn has_responded(&self) -> bool {
        self.responded.load(Ordering::SeqCst)
    }

    /// Send plain text back to the invoker
    pub async fn reply(&self, content: impl Into<String>) -> Result<()> {
        self.send(Reply::text(content)).await
    }

    /// Send a reply; interactions get a response first, follow-ups after
    ///
    /// Fails with [`DiscordError::Timeout`] when the platform does not
    /// answer within the dispatcher's remote timeout.
    pub async fn send(&self, reply: Reply) -> Result<()> {
        let followup = self.responded.swap(true, Ordering::SeqCst);
        tokio::time::timeout(
            self.timeout,
            self.gateway.reply(&self.origin, &reply, followup),
        )
        .await
        .map_err(|_| DiscordError::Timeout(format!("reply to {}", self.name)))?
    }

    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options
            .iter()
            .find(|option| option.name == name)
            .map(|option| &option.value)
    }

    pub fn str_option(&self, name: &str) -> Option<&str> {
        match self.option(name) {
            Some(OptionValue::String(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn channel_option(&self, name: &str) -> Option<ChannelId> {
        match self.option(name) {
            Some(OptionValue::Channel(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn user_option(&self, name: &str) -> Option<UserId> {
        match self.option(name) {
            Some(OptionValue::User(id)) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("args", &self.args)
            .field("options", &self.options)
            .field("author_id", &self.author_id)
            .field("channel_id", &self.channel_id)
            .field("guild_id", &self.guild_id)
            .finish_non_exhaustive()
    }
}

//! [`GatewayClient`] over serenity's HTTP client

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serenity::builder::{
    CreateCommand, CreateCommandOption, CreateEmbed, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, CreateMessage,
};
use serenity::http::Http;
use serenity::model::application::{Command, CommandOptionType};
use tracing::debug;

use crate::commands::{CommandSpec, ParamKind};
use crate::error::{DiscordError, Result};
use crate::gateway::{GatewayClient, Origin, Reply};

const ERROR_COLOUR: u32 = 0xff0000;

/// Publishes commands and sends replies through the Discord REST API
///
/// Bound to the client's [`Http`] once the client is built; until then
/// every call fails with [`DiscordError::NotRunning`].
#[derive(Default)]
pub struct SerenityGateway {
    http: RwLock<Option<Arc<Http>>>,
}

impl SerenityGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, http: Arc<Http>) {
        *self.http.write().unwrap_or_else(|e| e.into_inner()) = Some(http);
    }

    fn http(&self) -> Result<Arc<Http>> {
        self.http
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(DiscordError::NotRunning)
    }
}

fn option_type(kind: ParamKind) -> CommandOptionType {
    match kind {
        ParamKind::String => CommandOptionType::String,
        ParamKind::Integer => CommandOptionType::Integer,
        ParamKind::Number => CommandOptionType::Number,
        ParamKind::Boolean => CommandOptionType::Boolean,
        ParamKind::User => CommandOptionType::User,
        ParamKind::Channel => CommandOptionType::Channel,
        ParamKind::Role => CommandOptionType::Role,
    }
}

fn create_command(spec: &CommandSpec) -> CreateCommand {
    spec.params.iter().fold(
        CreateCommand::new(&spec.name).description(&spec.description),
        |command, param| {
            command.add_option(
                CreateCommandOption::new(option_type(param.kind), &param.name, &param.description)
                    .required(param.required),
            )
        },
    )
}

fn error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(title)
        .description(description)
        .colour(ERROR_COLOUR)
}

#[async_trait]
impl GatewayClient for SerenityGateway {
    async fn sync_commands(&self, commands: &[CommandSpec]) -> Result<usize> {
        let http = self.http()?;
        let builders = commands.iter().map(create_command).collect();
        let published = Command::set_global_commands(&http, builders).await?;
        Ok(published.len())
    }

    async fn reply(&self, origin: &Origin, reply: &Reply, followup: bool) -> Result<()> {
        let http = self.http()?;
        match origin {
            Origin::Message {
                channel_id,
                message_id,
            } => {
                let message = match reply {
                    Reply::Text(text) => CreateMessage::new().content(text),
                    Reply::Error { title, description } => {
                        CreateMessage::new().embed(error_embed(title, description))
                    }
                }
                .reference_message((*channel_id, *message_id));
                channel_id.send_message(&http, message).await?;
            }
            Origin::Interaction {
                interaction_id,
                token,
            } if !followup => {
                let message = match reply {
                    Reply::Text(text) => CreateInteractionResponseMessage::new().content(text),
                    Reply::Error { title, description } => {
                        CreateInteractionResponseMessage::new().embed(error_embed(title, description))
                    }
                };
                http.create_interaction_response(
                    *interaction_id,
                    token,
                    &CreateInteractionResponse::Message(message),
                    vec![],
                )
                .await?;
            }
            Origin::Interaction { token, .. } => {
                let message = match reply {
                    Reply::Text(text) => CreateInteractionResponseFollowup::new().content(text),
                    Reply::Error { title, description } => {
                        CreateInteractionResponseFollowup::new().embed(error_embed(title, description))
                    }
                };
                http.create_followup_message(token, &message, vec![]).await?;
            }
        }
        debug!("Replied to {:?}", origin);
        Ok(())
    }
}

//! Recording doubles shared by the unit tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, InteractionId, MessageId, UserId};

use crate::commands::{CommandContext, CommandHandler, CommandOption, CommandResult, CommandSpec};
use crate::error::{DiscordError, Result};
use crate::event::{
    DisconnectReason, InboundInteraction, InboundMessage, InteractionKind, ReadyInfo,
};
use crate::gateway::{GatewayClient, Origin, Reply};
use crate::hook::{Hook, HookResult};
use crate::voice::{AudioSource, VoiceBackend, VoiceMember};

pub const BOT_ID: u64 = 1000;
pub const GUILD: u64 = 42;

/// Ordered, shared call log
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.position(prefix).is_some()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

pub struct RecordingGateway {
    journal: Journal,
    fail_sync: bool,
}

impl RecordingGateway {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail_sync: false,
        }
    }

    pub fn failing_sync(journal: Journal) -> Self {
        Self {
            journal,
            fail_sync: true,
        }
    }
}

#[async_trait]
impl GatewayClient for RecordingGateway {
    async fn sync_commands(&self, commands: &[CommandSpec]) -> Result<usize> {
        let names: Vec<&str> = commands.iter().map(|c| c.name.as_str()).collect();
        self.journal.push(format!("sync:{}", names.join(",")));
        if self.fail_sync {
            return Err(DiscordError::Gateway("sync rejected".to_string()));
        }
        Ok(commands.len())
    }

    async fn reply(&self, origin: &Origin, reply: &Reply, followup: bool) -> Result<()> {
        let target = match origin {
            Origin::Message { .. } => "message",
            Origin::Interaction { .. } if followup => "followup",
            Origin::Interaction { .. } => "response",
        };
        match reply {
            Reply::Text(text) => self.journal.push(format!("reply:{}:{}", target, text)),
            Reply::Error { title, description } => self
                .journal
                .push(format!("reply-embed:{}:{}:{}", target, title, description)),
        }
        Ok(())
    }
}

pub struct RecordingHook {
    journal: Journal,
}

impl RecordingHook {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

#[async_trait]
impl Hook for RecordingHook {
    async fn on_connect(&self) -> HookResult {
        self.journal.push("hook:connect");
        Ok(())
    }

    async fn on_setup(&self) -> HookResult {
        self.journal.push("hook:setup");
        Ok(())
    }

    async fn on_ready(&self, ready: &ReadyInfo) -> HookResult {
        self.journal.push(format!("hook:ready:{}", ready.user_name));
        Ok(())
    }

    async fn on_message(&self, message: &InboundMessage) -> HookResult {
        self.journal.push(format!("hook:message:{}", message.content));
        Ok(())
    }

    async fn on_interaction(&self, interaction: &InboundInteraction) -> HookResult {
        let label = match &interaction.kind {
            InteractionKind::Command { name, .. } => name.clone(),
            InteractionKind::Autocomplete { name } => format!("autocomplete:{}", name),
            InteractionKind::Component { custom_id } => format!("component:{}", custom_id),
            InteractionKind::Modal { custom_id } => format!("modal:{}", custom_id),
        };
        self.journal.push(format!("hook:interaction:{}", label));
        Ok(())
    }

    async fn on_command_error(
        &self,
        ctx: &CommandContext,
        error: &(dyn std::error::Error + Send + Sync),
    ) -> HookResult {
        self.journal
            .push(format!("hook:command_error:{}:{}", ctx.name, error));
        Ok(())
    }

    async fn on_disconnect(&self, reason: &DisconnectReason) -> HookResult {
        self.journal.push(format!("hook:disconnect:{}", reason));
        Ok(())
    }
}

/// Hook whose slots all fail
pub struct FailingHook;

#[async_trait]
impl Hook for FailingHook {
    async fn on_message(&self, _message: &InboundMessage) -> HookResult {
        anyhow::bail!("hook exploded")
    }
}

pub struct RecordingHandler {
    label: String,
    journal: Journal,
    fail: Option<String>,
}

impl RecordingHandler {
    pub fn new(label: &str, journal: Journal) -> Self {
        Self {
            label: label.to_string(),
            journal,
            fail: None,
        }
    }

    pub fn failing(label: &str, journal: Journal, message: &str) -> Self {
        Self {
            label: label.to_string(),
            journal,
            fail: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl CommandHandler for RecordingHandler {
    async fn call(&self, ctx: CommandContext) -> CommandResult {
        self.journal
            .push(format!("handler:{}:{}", self.label, ctx.args));
        match &self.fail {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }
}

/// Handler that takes `delay` to finish
pub struct SlowHandler {
    label: String,
    journal: Journal,
    delay: Duration,
}

impl SlowHandler {
    pub fn new(label: &str, journal: Journal, delay: Duration) -> Self {
        Self {
            label: label.to_string(),
            journal,
            delay,
        }
    }
}

#[async_trait]
impl CommandHandler for SlowHandler {
    async fn call(&self, _ctx: CommandContext) -> CommandResult {
        self.journal.push(format!("handler:{}:start", self.label));
        tokio::time::sleep(self.delay).await;
        self.journal.push(format!("handler:{}:done", self.label));
        Ok(())
    }
}

/// Gateway whose replies never complete
pub struct StalledGateway;

#[async_trait]
impl GatewayClient for StalledGateway {
    async fn sync_commands(&self, commands: &[CommandSpec]) -> Result<usize> {
        Ok(commands.len())
    }

    async fn reply(&self, _origin: &Origin, _reply: &Reply, _followup: bool) -> Result<()> {
        std::future::pending().await
    }
}

/// Voice backend with an in-memory roster
pub struct MockVoice {
    journal: Journal,
    names: HashMap<ChannelId, String>,
    members: Mutex<HashMap<ChannelId, Vec<VoiceMember>>>,
    delay: Option<Duration>,
}

impl MockVoice {
    pub fn new(journal: Journal) -> Self {
        let mut names = HashMap::new();
        names.insert(channel(1), "channelA".to_string());
        names.insert(channel(2), "channelB".to_string());
        Self {
            journal,
            names,
            members: Mutex::new(HashMap::new()),
            delay: None,
        }
    }

    /// Every call sleeps for `delay` first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn seat(&self, channel_id: ChannelId, user: u64, name: &str) {
        self.members
            .lock()
            .unwrap()
            .entry(channel_id)
            .or_default()
            .push(VoiceMember {
                user_id: UserId::new(user),
                name: name.to_string(),
            });
    }

    pub fn roster(&self, channel_id: ChannelId) -> Vec<UserId> {
        self.members
            .lock()
            .unwrap()
            .get(&channel_id)
            .map(|members| members.iter().map(|m| m.user_id).collect())
            .unwrap_or_default()
    }

    async fn pause_if_slow(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl VoiceBackend for MockVoice {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        self.pause_if_slow().await;
        self.journal.push(format!("voice:join:{}:{}", guild_id, channel_id));
        Ok(())
    }

    async fn leave(&self, guild_id: GuildId) -> Result<()> {
        self.pause_if_slow().await;
        self.journal.push(format!("voice:leave:{}", guild_id));
        Ok(())
    }

    async fn play(&self, guild_id: GuildId, source: &AudioSource) -> Result<()> {
        self.pause_if_slow().await;
        self.journal.push(format!("voice:play:{}:{}", guild_id, source));
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> Result<()> {
        self.journal.push(format!("voice:stop:{}", guild_id));
        Ok(())
    }

    async fn pause(&self, guild_id: GuildId) -> Result<()> {
        self.journal.push(format!("voice:pause:{}", guild_id));
        Ok(())
    }

    async fn resume(&self, guild_id: GuildId) -> Result<()> {
        self.journal.push(format!("voice:resume:{}", guild_id));
        Ok(())
    }

    async fn channel_name(&self, channel_id: ChannelId) -> Result<String> {
        self.names
            .get(&channel_id)
            .cloned()
            .ok_or_else(|| DiscordError::Voice(format!("unknown channel {}", channel_id)))
    }

    async fn channel_members(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Vec<VoiceMember>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&channel_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        target: Option<ChannelId>,
    ) -> Result<()> {
        let mut members = self.members.lock().unwrap();
        let mut moved = None;
        for roster in members.values_mut() {
            if let Some(pos) = roster.iter().position(|m| m.user_id == user_id) {
                moved = Some(roster.remove(pos));
            }
        }
        if let (Some(member), Some(target)) = (moved, target) {
            members.entry(target).or_default().push(member);
        }
        let target = target.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string());
        self.journal
            .push(format!("voice:move:{}:{}:{}", guild_id, user_id, target));
        Ok(())
    }
}

pub fn channel(id: u64) -> ChannelId {
    ChannelId::new(id)
}

pub fn guild() -> GuildId {
    GuildId::new(GUILD)
}

pub fn ready() -> ReadyInfo {
    ReadyInfo {
        user_id: UserId::new(BOT_ID),
        user_name: "hookbot".to_string(),
        guild_count: 1,
    }
}

pub fn message(author: u64, content: &str) -> InboundMessage {
    InboundMessage {
        id: MessageId::new(7),
        channel_id: channel(10),
        guild_id: Some(guild()),
        author_id: UserId::new(author),
        author_name: format!("user{}", author),
        content: content.to_string(),
    }
}

pub fn message_in(guild_id: GuildId, author: u64, content: &str) -> InboundMessage {
    InboundMessage {
        guild_id: Some(guild_id),
        ..message(author, content)
    }
}

pub fn interaction(kind: InteractionKind) -> InboundInteraction {
    InboundInteraction {
        id: InteractionId::new(9),
        token: "interaction-token".to_string(),
        kind,
        channel_id: Some(channel(10)),
        guild_id: Some(guild()),
        user_id: UserId::new(5),
    }
}

pub fn command(name: &str, options: Vec<CommandOption>) -> InboundInteraction {
    interaction(InteractionKind::Command {
        name: name.to_string(),
        options,
    })
}

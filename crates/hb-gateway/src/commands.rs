//! Demo command set
//!
//! Each command is available both as `!name` and as `/name`. Prefix
//! commands take positional arguments; mentions (`<#id>`, `<@id>`) and raw
//! ids are accepted wherever a channel or user is expected.

use std::sync::Arc;

use async_trait::async_trait;
use hb_discord::{
    AudioSource, BotHandle, CommandContext, CommandError, CommandHandler, CommandKind,
    CommandParam, CommandResult, DiscordBot, ParamKind, VoiceManager, VoiceState,
};
use hb_discord::serenity::model::id::{ChannelId, GuildId, UserId};

/// Register every demo command on `bot`
pub fn register(bot: &DiscordBot) -> hb_discord::Result<()> {
    let voice = bot.voice();
    let style = bot
        .registry()
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .style();

    let both = |name: &str,
                description: &str,
                handler: Arc<dyn CommandHandler>,
                params: Vec<CommandParam>|
     -> hb_discord::Result<()> {
        if style.allows(CommandKind::Prefix) {
            bot.register_prefix_command(name, Shared(handler.clone()))?;
        }
        if style.allows(CommandKind::Interaction) {
            bot.register_interaction_command(name, description, Shared(handler), params)?;
        }
        Ok(())
    };

    both("ping", "Check that the bot is alive", Arc::new(Ping), vec![])?;
    both(
        "join",
        "Join a voice channel",
        Arc::new(Join(voice.clone())),
        vec![channel_param("Voice channel to join")],
    )?;
    both(
        "play",
        "Play an audio file",
        Arc::new(Play(voice.clone())),
        vec![
            CommandParam::new("file", "Path of the audio file", ParamKind::String),
            channel_param("Voice channel to play in").optional(),
        ],
    )?;
    for (control, description) in [
        (Control::Pause, "Pause playback"),
        (Control::Resume, "Resume playback"),
        (Control::Stop, "Stop playback"),
        (Control::Leave, "Leave the voice channel"),
    ] {
        both(
            control.name(),
            description,
            Arc::new(Playback {
                voice: voice.clone(),
                control,
            }),
            vec![],
        )?;
    }
    both(
        "status",
        "Show the voice session",
        Arc::new(Status(voice.clone())),
        vec![],
    )?;
    both(
        "members",
        "List members of the bot's voice channel",
        Arc::new(Members(voice.clone())),
        vec![],
    )?;
    both(
        "kick",
        "Disconnect a member from the bot's voice channel",
        Arc::new(Kick(voice.clone())),
        vec![user_param()],
    )?;
    both(
        "move",
        "Move a member from the bot's voice channel",
        Arc::new(Move(voice)),
        vec![user_param(), channel_param("Destination channel")],
    )?;
    both(
        "reboot",
        "Restart the Discord session",
        Arc::new(Reboot(bot.handle())),
        vec![],
    )?;

    Ok(())
}

fn channel_param(description: &str) -> CommandParam {
    CommandParam::new("channel", description, ParamKind::Channel)
}

fn user_param() -> CommandParam {
    CommandParam::new("user", "Member to act on", ParamKind::User)
}

/// One handler shared between the prefix and interaction registrations
struct Shared(Arc<dyn CommandHandler>);

#[async_trait]
impl CommandHandler for Shared {
    async fn call(&self, ctx: CommandContext) -> CommandResult {
        self.0.call(ctx).await
    }
}

/// Parse a raw id or a `<#id>` / `<@id>` / `<@!id>` mention
fn parse_id(token: &str) -> Option<u64> {
    let inner = token
        .strip_prefix("<#")
        .or_else(|| token.strip_prefix("<@!"))
        .or_else(|| token.strip_prefix("<@"))
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(token);
    inner.parse().ok().filter(|id| *id != 0)
}

/// Positional argument `index` of a prefix command
fn arg(ctx: &CommandContext, index: usize) -> Option<&str> {
    ctx.args.split_whitespace().nth(index)
}

fn guild(ctx: &CommandContext) -> Result<GuildId, CommandError> {
    ctx.guild_id
        .ok_or_else(|| "This command only works in a server".into())
}

fn channel_arg(ctx: &CommandContext, index: usize) -> Option<ChannelId> {
    match ctx.kind {
        CommandKind::Interaction => ctx.channel_option("channel"),
        CommandKind::Prefix => arg(ctx, index).and_then(parse_id).map(ChannelId::new),
    }
}

fn user_arg(ctx: &CommandContext, index: usize) -> Option<UserId> {
    match ctx.kind {
        CommandKind::Interaction => ctx.user_option("user"),
        CommandKind::Prefix => arg(ctx, index).and_then(parse_id).map(UserId::new),
    }
}

fn describe(state: VoiceState) -> &'static str {
    match state {
        VoiceState::Disconnected => "Not connected.",
        VoiceState::Connected => "Connected, nothing playing.",
        VoiceState::Playing => "Playing.",
        VoiceState::Paused => "Paused.",
    }
}

struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    async fn call(&self, ctx: CommandContext) -> CommandResult {
        ctx.reply("Pong!").await?;
        Ok(())
    }
}

struct Join(Arc<VoiceManager>);

#[async_trait]
impl CommandHandler for Join {
    async fn call(&self, ctx: CommandContext) -> CommandResult {
        let guild = guild(&ctx)?;
        let channel = channel_arg(&ctx, 0).ok_or("Which voice channel?")?;
        self.0.connect(guild, channel).await?;
        ctx.reply(format!("Joined <#{}>", channel)).await?;
        Ok(())
    }
}

struct Play(Arc<VoiceManager>);

#[async_trait]
impl CommandHandler for Play {
    async fn call(&self, ctx: CommandContext) -> CommandResult {
        let guild = guild(&ctx)?;
        let file = match ctx.kind {
            CommandKind::Interaction => ctx.str_option("file").map(str::to_string),
            CommandKind::Prefix => arg(&ctx, 0).map(str::to_string),
        }
        .ok_or("Which file?")?;

        let channel = match channel_arg(&ctx, 1) {
            Some(channel) => channel,
            None => self
                .0
                .current_channel(guild)
                .await
                .ok_or("Not in a voice channel; pass one to join")?,
        };

        self.0
            .play(guild, channel, AudioSource::file(&file))
            .await?;
        ctx.reply(format!("Now playing {}", file)).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Pause,
    Resume,
    Stop,
    Leave,
}

impl Control {
    fn name(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Leave => "leave",
        }
    }
}

struct Playback {
    voice: Arc<VoiceManager>,
    control: Control,
}

#[async_trait]
impl CommandHandler for Playback {
    async fn call(&self, ctx: CommandContext) -> CommandResult {
        let guild = guild(&ctx)?;
        let state = match self.control {
            Control::Pause => self.voice.pause(guild).await?,
            Control::Resume => self.voice.resume(guild).await?,
            Control::Stop => self.voice.stop(guild).await?,
            Control::Leave => self.voice.disconnect(guild).await?,
        };
        ctx.reply(describe(state)).await?;
        Ok(())
    }
}

struct Status(Arc<VoiceManager>);

#[async_trait]
impl CommandHandler for Status {
    async fn call(&self, ctx: CommandContext) -> CommandResult {
        let status = self.0.status(guild(&ctx)?).await;
        let text = match (&status.channel_name, &status.source) {
            (Some(channel), Some(source)) => {
                format!("{} in {} ({})", describe(status.state()), channel, source)
            }
            (Some(channel), None) => format!("{} in {}", describe(status.state()), channel),
            _ => describe(status.state()).to_string(),
        };
        ctx.reply(text).await?;
        Ok(())
    }
}

struct Members(Arc<VoiceManager>);

#[async_trait]
impl CommandHandler for Members {
    async fn call(&self, ctx: CommandContext) -> CommandResult {
        let members = self.0.list_members(guild(&ctx)?).await?;
        let text = if members.is_empty() {
            "Nobody here.".to_string()
        } else {
            members
                .iter()
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        ctx.reply(text).await?;
        Ok(())
    }
}

struct Kick(Arc<VoiceManager>);

#[async_trait]
impl CommandHandler for Kick {
    async fn call(&self, ctx: CommandContext) -> CommandResult {
        let guild = guild(&ctx)?;
        let user = user_arg(&ctx, 0).ok_or("Who?")?;
        self.0.kick_member(guild, user).await?;
        ctx.reply(format!("Done with <@{}>", user)).await?;
        Ok(())
    }
}

struct Move(Arc<VoiceManager>);

#[async_trait]
impl CommandHandler for Move {
    async fn call(&self, ctx: CommandContext) -> CommandResult {
        let guild = guild(&ctx)?;
        let user = user_arg(&ctx, 0).ok_or("Who?")?;
        let target = channel_arg(&ctx, 1).ok_or("Where to?")?;
        self.0.move_member(guild, user, target).await?;
        ctx.reply(format!("Done with <@{}>", user)).await?;
        Ok(())
    }
}

struct Reboot(BotHandle);

#[async_trait]
impl CommandHandler for Reboot {
    async fn call(&self, ctx: CommandContext) -> CommandResult {
        ctx.reply("Rebooting...").await?;
        self.0.reboot().await?;
        Ok(())
    }
}

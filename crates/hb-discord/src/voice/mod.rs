//! Per-guild voice sessions
//!
//! [`VoiceManager`] keeps at most one [`VoiceSession`] per guild and drives
//! it through `Disconnected → Connected ⇄ Playing ⇄ Paused`. The actual
//! audio transport and member roster live behind [`VoiceBackend`].

mod discord;
mod manager;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, GuildId, UserId};

use crate::error::Result;

pub use discord::DiscordVoice;
pub use manager::VoiceManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Disconnected,
    Connected,
    Playing,
    Paused,
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Playing => "playing",
            Self::Paused => "paused",
        };
        f.write_str(label)
    }
}

/// Something the transport can play
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Local audio file
    File(PathBuf),
}

impl AudioSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Someone currently in a voice channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceMember {
    pub user_id: UserId,
    pub name: String,
}

/// Live voice session of one guild
#[derive(Debug, Clone)]
pub struct VoiceSession {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub state: VoiceState,
    /// Present only while playing or paused
    pub source: Option<AudioSource>,
    pub connected_at: DateTime<Utc>,
}

impl VoiceSession {
    fn new(guild_id: GuildId, channel_id: ChannelId, channel_name: String) -> Self {
        Self {
            guild_id,
            channel_id,
            channel_name,
            state: VoiceState::Connected,
            source: None,
            connected_at: Utc::now(),
        }
    }
}

/// Point-in-time view of a guild's voice session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceStatus {
    pub connected: bool,
    pub playing: bool,
    pub paused: bool,
    pub channel_id: Option<ChannelId>,
    pub channel_name: Option<String>,
    pub source: Option<AudioSource>,
    pub connected_at: Option<DateTime<Utc>>,
}

impl VoiceStatus {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            playing: false,
            paused: false,
            channel_id: None,
            channel_name: None,
            source: None,
            connected_at: None,
        }
    }

    pub fn state(&self) -> VoiceState {
        match (self.connected, self.playing, self.paused) {
            (false, _, _) => VoiceState::Disconnected,
            (true, true, _) => VoiceState::Playing,
            (true, _, true) => VoiceState::Paused,
            _ => VoiceState::Connected,
        }
    }
}

impl From<&VoiceSession> for VoiceStatus {
    fn from(session: &VoiceSession) -> Self {
        Self {
            connected: true,
            playing: session.state == VoiceState::Playing,
            paused: session.state == VoiceState::Paused,
            channel_id: Some(session.channel_id),
            channel_name: Some(session.channel_name.clone()),
            source: session.source.clone(),
            connected_at: Some(session.connected_at),
        }
    }
}

/// Audio transport plus live channel roster
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    /// Join (or move the bot to) `channel_id`
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()>;

    async fn leave(&self, guild_id: GuildId) -> Result<()>;

    /// Start playing `source`; the previous track was already stopped
    async fn play(&self, guild_id: GuildId, source: &AudioSource) -> Result<()>;

    async fn stop(&self, guild_id: GuildId) -> Result<()>;

    async fn pause(&self, guild_id: GuildId) -> Result<()>;

    async fn resume(&self, guild_id: GuildId) -> Result<()>;

    async fn channel_name(&self, channel_id: ChannelId) -> Result<String>;

    /// Members currently in `channel_id`, read from the live roster
    async fn channel_members(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Vec<VoiceMember>>;

    /// Move a member to `target`, or disconnect them when `target` is `None`
    async fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        target: Option<ChannelId>,
    ) -> Result<()>;
}

//! Voice backend over serenity's HTTP client and cache
//!
//! The roster and member moves go through the REST API and the gateway
//! cache. Audio goes through songbird when the `songbird` feature is on;
//! without it, transport calls fail with [`DiscordError::Voice`].

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serenity::cache::Cache;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId, UserId};
use tracing::debug;

use super::{AudioSource, VoiceBackend, VoiceMember};
use crate::error::{DiscordError, Result};

#[derive(Clone)]
struct Binding {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

/// [`VoiceBackend`] for a live Discord session
///
/// Created before the client exists and bound to its HTTP client and cache
/// with [`DiscordVoice::bind`] once it does. Calls made while unbound fail
/// with [`DiscordError::NotRunning`].
pub struct DiscordVoice {
    binding: RwLock<Option<Binding>>,
    #[cfg(feature = "songbird")]
    songbird: Arc<songbird::Songbird>,
    #[cfg(feature = "songbird")]
    tracks: dashmap::DashMap<GuildId, songbird::tracks::TrackHandle>,
}

impl DiscordVoice {
    pub fn new() -> Self {
        Self {
            binding: RwLock::new(None),
            #[cfg(feature = "songbird")]
            songbird: songbird::Songbird::serenity(),
            #[cfg(feature = "songbird")]
            tracks: dashmap::DashMap::new(),
        }
    }

    pub fn bind(&self, http: Arc<Http>, cache: Arc<Cache>) {
        *self.binding.write().unwrap_or_else(|e| e.into_inner()) = Some(Binding { http, cache });
    }

    /// Songbird manager to register with the client builder
    #[cfg(feature = "songbird")]
    pub fn songbird(&self) -> Arc<songbird::Songbird> {
        self.songbird.clone()
    }

    fn bound(&self) -> Result<Binding> {
        self.binding
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(DiscordError::NotRunning)
    }
}

impl Default for DiscordVoice {
    fn default() -> Self {
        Self::new()
    }
}

/// Members of `channel_id` according to the cached voice states
fn cached_roster(cache: &Cache, guild_id: GuildId, channel_id: ChannelId) -> Option<Vec<VoiceMember>> {
    let guild = cache.guild(guild_id)?;
    let mut members: Vec<VoiceMember> = guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel_id))
        .map(|state| {
            let name = state
                .member
                .as_ref()
                .or_else(|| guild.members.get(&state.user_id))
                .map(|member| member.display_name().to_string())
                .unwrap_or_else(|| state.user_id.to_string());
            VoiceMember {
                user_id: state.user_id,
                name,
            }
        })
        .collect();
    members.sort_by(|a, b| a.name.cmp(&b.name));
    Some(members)
}

#[async_trait]
impl VoiceBackend for DiscordVoice {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        self.bound()?;
        self.transport_join(guild_id, channel_id).await
    }

    async fn leave(&self, guild_id: GuildId) -> Result<()> {
        self.bound()?;
        self.transport_leave(guild_id).await
    }

    async fn play(&self, guild_id: GuildId, source: &AudioSource) -> Result<()> {
        self.bound()?;
        self.transport_play(guild_id, source).await
    }

    async fn stop(&self, guild_id: GuildId) -> Result<()> {
        self.transport_stop(guild_id).await
    }

    async fn pause(&self, guild_id: GuildId) -> Result<()> {
        self.transport_pause(guild_id).await
    }

    async fn resume(&self, guild_id: GuildId) -> Result<()> {
        self.transport_resume(guild_id).await
    }

    async fn channel_name(&self, channel_id: ChannelId) -> Result<String> {
        let binding = self.bound()?;
        let channel = channel_id.to_channel(&binding.http).await?;
        channel
            .guild()
            .map(|channel| channel.name)
            .ok_or_else(|| DiscordError::Voice(format!("{} is not a guild channel", channel_id)))
    }

    async fn channel_members(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Vec<VoiceMember>> {
        let binding = self.bound()?;
        cached_roster(&binding.cache, guild_id, channel_id)
            .ok_or_else(|| DiscordError::Voice(format!("guild {} is not cached", guild_id)))
    }

    async fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        target: Option<ChannelId>,
    ) -> Result<()> {
        let binding = self.bound()?;
        match target {
            Some(target) => {
                guild_id.move_member(&binding.http, user_id, target).await?;
            }
            None => {
                guild_id.disconnect_member(&binding.http, user_id).await?;
            }
        }
        debug!("Relocated user {} in guild {}", user_id, guild_id);
        Ok(())
    }
}

#[cfg(feature = "songbird")]
impl DiscordVoice {
    async fn transport_join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        self.songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| DiscordError::Voice(e.to_string()))?;
        Ok(())
    }

    async fn transport_leave(&self, guild_id: GuildId) -> Result<()> {
        self.tracks.remove(&guild_id);
        self.songbird
            .remove(guild_id)
            .await
            .map_err(|e| DiscordError::Voice(e.to_string()))
    }

    async fn transport_play(&self, guild_id: GuildId, source: &AudioSource) -> Result<()> {
        let call = self
            .songbird
            .get(guild_id)
            .ok_or_else(|| DiscordError::Voice(format!("no voice call in guild {}", guild_id)))?;
        let input: songbird::input::Input = match source {
            AudioSource::File(path) => songbird::input::File::new(path.clone()).into(),
        };
        let track = call.lock().await.play_input(input);
        self.tracks.insert(guild_id, track);
        Ok(())
    }

    async fn transport_stop(&self, guild_id: GuildId) -> Result<()> {
        self.tracks.remove(&guild_id);
        if let Some(call) = self.songbird.get(guild_id) {
            call.lock().await.stop();
        }
        Ok(())
    }

    async fn transport_pause(&self, guild_id: GuildId) -> Result<()> {
        self.track(guild_id)?
            .pause()
            .map_err(|e| DiscordError::Voice(e.to_string()))
    }

    async fn transport_resume(&self, guild_id: GuildId) -> Result<()> {
        self.track(guild_id)?
            .play()
            .map_err(|e| DiscordError::Voice(e.to_string()))
    }

    fn track(&self, guild_id: GuildId) -> Result<songbird::tracks::TrackHandle> {
        self.tracks
            .get(&guild_id)
            .map(|track| track.clone())
            .ok_or_else(|| DiscordError::Voice(format!("nothing is playing in guild {}", guild_id)))
    }
}

#[cfg(not(feature = "songbird"))]
impl DiscordVoice {
    fn unsupported() -> DiscordError {
        DiscordError::Voice("audio transport requires the `songbird` feature".to_string())
    }

    async fn transport_join(&self, _guild_id: GuildId, _channel_id: ChannelId) -> Result<()> {
        Err(Self::unsupported())
    }

    async fn transport_leave(&self, _guild_id: GuildId) -> Result<()> {
        Err(Self::unsupported())
    }

    async fn transport_play(&self, _guild_id: GuildId, _source: &AudioSource) -> Result<()> {
        Err(Self::unsupported())
    }

    async fn transport_stop(&self, _guild_id: GuildId) -> Result<()> {
        Err(Self::unsupported())
    }

    async fn transport_pause(&self, _guild_id: GuildId) -> Result<()> {
        Err(Self::unsupported())
    }

    async fn transport_resume(&self, _guild_id: GuildId) -> Result<()> {
        Err(Self::unsupported())
    }
}

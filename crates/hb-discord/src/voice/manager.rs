use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::{AudioSource, VoiceBackend, VoiceMember, VoiceSession, VoiceState, VoiceStatus};
use crate::error::{DiscordError, Result};

type Slot = Arc<Mutex<Option<VoiceSession>>>;
type SlotGuard = OwnedMutexGuard<Option<VoiceSession>>;

/// Arena of voice sessions keyed by guild
///
/// Each guild has its own lock. A state-changing call that finds the lock
/// held fails with [`DiscordError::Busy`] instead of queueing behind the
/// other call. Guilds never contend with each other. Every backend call is
/// bounded by the operation timeout, and a session's state changes only
/// after the backend call succeeded.
///
/// Operations that have nothing to do (pausing while not playing, stopping
/// while connected, kicking someone who is not in the channel...) return the
/// current state unchanged.
///
/// Only `connect` and `play` create a guild's entry, and it is removed again
/// as soon as the guild has no session.
pub struct VoiceManager {
    backend: Arc<dyn VoiceBackend>,
    sessions: DashMap<GuildId, Slot>,
    timeout: Duration,
}

impl VoiceManager {
    pub fn new(backend: Arc<dyn VoiceBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            sessions: DashMap::new(),
            timeout,
        }
    }

    pub async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<VoiceState> {
        let mut slot = self.acquire(guild_id)?;
        let result = self.connect_locked(&mut slot, guild_id, channel_id).await;
        self.settle(guild_id, slot);
        result
    }

    async fn connect_locked(
        &self,
        slot: &mut Option<VoiceSession>,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<VoiceState> {
        if let Some(session) = slot.as_mut() {
            if session.channel_id == channel_id {
                return Ok(session.state);
            }
            self.bounded("join", self.backend.join(guild_id, channel_id)).await?;
            session.channel_id = channel_id;
            session.channel_name = self.lookup_name(channel_id).await;
            info!("Moved voice session in guild {} to {}", guild_id, session.channel_name);
            return Ok(session.state);
        }

        let session = self.open(guild_id, channel_id).await?;
        let state = session.state;
        *slot = Some(session);
        Ok(state)
    }

    /// Play `source`, joining `channel_id` first when disconnected
    ///
    /// An already connected session keeps its channel. A track that is
    /// playing or paused is stopped before the new one starts.
    pub async fn play(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        source: AudioSource,
    ) -> Result<VoiceState> {
        let mut slot = self.acquire(guild_id)?;
        let result = self.play_locked(&mut slot, guild_id, channel_id, source).await;
        self.settle(guild_id, slot);
        result
    }

    async fn play_locked(
        &self,
        slot: &mut Option<VoiceSession>,
        guild_id: GuildId,
        channel_id: ChannelId,
        source: AudioSource,
    ) -> Result<VoiceState> {
        if slot.is_none() {
            *slot = Some(self.open(guild_id, channel_id).await?);
        }
        let session = slot
            .as_mut()
            .ok_or_else(|| DiscordError::Voice(format!("no session for guild {}", guild_id)))?;

        if matches!(session.state, VoiceState::Playing | VoiceState::Paused) {
            self.bounded("stop", self.backend.stop(guild_id)).await?;
            session.state = VoiceState::Connected;
            session.source = None;
        }

        self.bounded("play", self.backend.play(guild_id, &source)).await?;
        info!("Playing {} in {}", source, session.channel_name);
        session.source = Some(source);
        session.state = VoiceState::Playing;
        Ok(session.state)
    }

    pub async fn stop(&self, guild_id: GuildId) -> Result<VoiceState> {
        let Some(mut slot) = self.acquire_existing(guild_id)? else {
            return Ok(VoiceState::Disconnected);
        };
        let Some(session) = slot.as_mut() else {
            return Ok(VoiceState::Disconnected);
        };
        if !matches!(session.state, VoiceState::Playing | VoiceState::Paused) {
            return Ok(session.state);
        }

        self.bounded("stop", self.backend.stop(guild_id)).await?;
        session.state = VoiceState::Connected;
        session.source = None;
        Ok(session.state)
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<VoiceState> {
        let Some(mut slot) = self.acquire_existing(guild_id)? else {
            return Ok(VoiceState::Disconnected);
        };
        let Some(session) = slot.as_mut() else {
            return Ok(VoiceState::Disconnected);
        };
        if session.state != VoiceState::Playing {
            return Ok(session.state);
        }

        self.bounded("pause", self.backend.pause(guild_id)).await?;
        session.state = VoiceState::Paused;
        Ok(session.state)
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<VoiceState> {
        let Some(mut slot) = self.acquire_existing(guild_id)? else {
            return Ok(VoiceState::Disconnected);
        };
        let Some(session) = slot.as_mut() else {
            return Ok(VoiceState::Disconnected);
        };
        if session.state != VoiceState::Paused {
            return Ok(session.state);
        }

        self.bounded("resume", self.backend.resume(guild_id)).await?;
        session.state = VoiceState::Playing;
        Ok(session.state)
    }

    /// Leave the channel and release the session
    pub async fn disconnect(&self, guild_id: GuildId) -> Result<VoiceState> {
        let Some(mut slot) = self.acquire_existing(guild_id)? else {
            return Ok(VoiceState::Disconnected);
        };
        if slot.is_some() {
            self.bounded("leave", self.backend.leave(guild_id)).await?;
            if let Some(session) = slot.take() {
                info!("Left voice channel {} in guild {}", session.channel_name, guild_id);
            }
        }
        self.settle(guild_id, slot);
        Ok(VoiceState::Disconnected)
    }

    /// Snapshot of the guild's session; waits for an in-flight operation
    pub async fn status(&self, guild_id: GuildId) -> VoiceStatus {
        let Some(slot) = self.existing(guild_id) else {
            return VoiceStatus::disconnected();
        };
        let session = slot.lock().await;
        session
            .as_ref()
            .map(VoiceStatus::from)
            .unwrap_or_else(VoiceStatus::disconnected)
    }

    pub async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.status(guild_id).await.channel_id
    }

    /// Members of the session's channel; empty when disconnected
    pub async fn list_members(&self, guild_id: GuildId) -> Result<Vec<VoiceMember>> {
        let Some(channel_id) = self.current_channel(guild_id).await else {
            return Ok(Vec::new());
        };
        self.bounded(
            "channel members",
            self.backend.channel_members(guild_id, channel_id),
        )
        .await
    }

    /// Disconnect `user_id` from the session's channel if they are in it
    pub async fn kick_member(&self, guild_id: GuildId, user_id: UserId) -> Result<VoiceState> {
        self.relocate(guild_id, user_id, None).await
    }

    /// Move `user_id` from the session's channel to `target` if they are in it
    pub async fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        target: ChannelId,
    ) -> Result<VoiceState> {
        self.relocate(guild_id, user_id, Some(target)).await
    }

    async fn relocate(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        target: Option<ChannelId>,
    ) -> Result<VoiceState> {
        let Some(slot) = self.acquire_existing(guild_id)? else {
            return Ok(VoiceState::Disconnected);
        };
        let Some(session) = slot.as_ref() else {
            return Ok(VoiceState::Disconnected);
        };

        let members = self
            .bounded(
                "channel members",
                self.backend.channel_members(guild_id, session.channel_id),
            )
            .await?;
        if !members.iter().any(|m| m.user_id == user_id) {
            debug!("User {} is not in {}; nothing to do", user_id, session.channel_name);
            return Ok(session.state);
        }

        self.bounded("move member", self.backend.move_member(guild_id, user_id, target))
            .await?;
        match target {
            Some(target) => info!("Moved user {} from {} to {}", user_id, session.channel_name, target),
            None => info!("Kicked user {} from {}", user_id, session.channel_name),
        }
        Ok(session.state)
    }

    async fn open(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<VoiceSession> {
        self.bounded("join", self.backend.join(guild_id, channel_id)).await?;
        let name = self.lookup_name(channel_id).await;
        info!("Joined voice channel {} in guild {}", name, guild_id);
        Ok(VoiceSession::new(guild_id, channel_id, name))
    }

    async fn lookup_name(&self, channel_id: ChannelId) -> String {
        match self
            .bounded("channel name", self.backend.channel_name(channel_id))
            .await
        {
            Ok(name) => name,
            Err(e) => {
                warn!("Could not resolve name of channel {}: {}", channel_id, e);
                channel_id.to_string()
            }
        }
    }

    fn existing(&self, guild_id: GuildId) -> Option<Slot> {
        self.sessions.get(&guild_id).map(|slot| slot.clone())
    }

    /// Lock the guild's slot, creating it if needed
    fn acquire(&self, guild_id: GuildId) -> Result<SlotGuard> {
        loop {
            let slot = self.sessions.entry(guild_id).or_default().clone();
            if let Some(guard) = self.lock_live(guild_id, slot)? {
                return Ok(guard);
            }
        }
    }

    /// Lock the guild's slot if it has one
    fn acquire_existing(&self, guild_id: GuildId) -> Result<Option<SlotGuard>> {
        loop {
            let Some(slot) = self.existing(guild_id) else {
                return Ok(None);
            };
            if let Some(guard) = self.lock_live(guild_id, slot)? {
                return Ok(Some(guard));
            }
        }
    }

    /// `None` when the slot was removed from the arena before the lock was taken
    fn lock_live(&self, guild_id: GuildId, slot: Slot) -> Result<Option<SlotGuard>> {
        let guard = slot
            .clone()
            .try_lock_owned()
            .map_err(|_| DiscordError::Busy(guild_id))?;
        let live = self
            .sessions
            .get(&guild_id)
            .is_some_and(|current| Arc::ptr_eq(current.value(), &slot));
        Ok(live.then_some(guard))
    }

    /// Release the slot, dropping it from the arena when it holds no session
    fn settle(&self, guild_id: GuildId, guard: SlotGuard) {
        if guard.is_none() {
            let slot = OwnedMutexGuard::mutex(&guard);
            self.sessions
                .remove_if(&guild_id, |_, current| Arc::ptr_eq(current, slot));
        }
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| DiscordError::Timeout(operation.to_string()))?
    }
}

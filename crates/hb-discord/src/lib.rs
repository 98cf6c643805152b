//! hb-discord: hook-driven Discord bot façade
//!
//! A [`DiscordBot`] owns one gateway session. Lifecycle events flow through
//! the [`Dispatcher`], which routes prefix and interaction commands from a
//! single [`CommandRegistry`] and then notifies the host's [`Hook`]. Voice
//! sessions are kept per guild by the [`VoiceManager`].
//!
//! Serenity 0.12 drives the gateway; audio needs the `songbird` feature.

pub mod bot;
pub mod client;
pub mod commands;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod gateway;
pub mod handler;
pub mod hook;
pub mod voice;

#[cfg(test)]
mod testing;

pub use serenity;

pub use bot::{BotHandle, DiscordBot};
pub use client::SerenityGateway;
pub use commands::{
    CommandContext, CommandError, CommandHandler, CommandKind, CommandOption, CommandParam,
    CommandRegistry, CommandResult, CommandStyle, OptionValue, ParamKind,
};
pub use dispatcher::{DispatchSettings, Dispatcher, LifecycleState};
pub use error::{DiscordError, Result};
pub use event::{DisconnectReason, InboundInteraction, InboundMessage, InteractionKind, ReadyInfo};
pub use gateway::{GatewayClient, Origin, Reply};
pub use hook::{Hook, HookResult, NoopHook};
pub use voice::{
    AudioSource, DiscordVoice, VoiceBackend, VoiceManager, VoiceMember, VoiceSession, VoiceState,
    VoiceStatus,
};

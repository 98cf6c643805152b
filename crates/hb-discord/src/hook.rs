//! Host-supplied lifecycle observer
//!
//! Every slot has a no-op default, so a hook overrides only what it cares
//! about. Slots run after the dispatcher has committed its own handling of
//! the event; a failing slot is logged and otherwise ignored.

use async_trait::async_trait;

use crate::commands::CommandContext;
use crate::event::{DisconnectReason, InboundInteraction, InboundMessage, ReadyInfo};

/// Result of a hook slot
pub type HookResult = anyhow::Result<()>;

#[async_trait]
pub trait Hook: Send + Sync {
    /// Gateway connection is being established
    async fn on_connect(&self) -> HookResult {
        Ok(())
    }

    /// Command tree has been published for this session
    async fn on_setup(&self) -> HookResult {
        Ok(())
    }

    async fn on_ready(&self, _ready: &ReadyInfo) -> HookResult {
        Ok(())
    }

    /// Any message not authored by the bot, command or not
    async fn on_message(&self, _message: &InboundMessage) -> HookResult {
        Ok(())
    }

    /// Every interaction, after command routing
    async fn on_interaction(&self, _interaction: &InboundInteraction) -> HookResult {
        Ok(())
    }

    /// A command handler failed; the invoker has already been told
    async fn on_command_error(
        &self,
        _ctx: &CommandContext,
        _error: &(dyn std::error::Error + Send + Sync),
    ) -> HookResult {
        Ok(())
    }

    async fn on_disconnect(&self, _reason: &DisconnectReason) -> HookResult {
        Ok(())
    }
}

/// Hook with every slot left at its default
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl Hook for NoopHook {}

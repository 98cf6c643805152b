//! Hook that logs lifecycle events

use async_trait::async_trait;
use hb_discord::{CommandContext, DisconnectReason, Hook, HookResult, InboundInteraction, ReadyInfo};

pub struct LoggingHook;

#[async_trait]
impl Hook for LoggingHook {
    async fn on_connect(&self) -> HookResult {
        tracing::info!("Connecting to Discord");
        Ok(())
    }

    async fn on_ready(&self, ready: &ReadyInfo) -> HookResult {
        tracing::info!("{} is online in {} guilds", ready.user_name, ready.guild_count);
        Ok(())
    }

    async fn on_interaction(&self, interaction: &InboundInteraction) -> HookResult {
        tracing::debug!("Interaction {:?} from {}", interaction.kind, interaction.user_id);
        Ok(())
    }

    async fn on_command_error(
        &self,
        ctx: &CommandContext,
        error: &(dyn std::error::Error + Send + Sync),
    ) -> HookResult {
        tracing::warn!("{} command {} failed for {}: {}", ctx.kind, ctx.name, ctx.author_id, error);
        Ok(())
    }

    async fn on_disconnect(&self, reason: &DisconnectReason) -> HookResult {
        tracing::info!("Disconnected: {}", reason);
        Ok(())
    }
}

//! Lifecycle dispatcher
//!
//! Receives gateway events one at a time, applies the internal handling for
//! each (state transition, command routing, command-tree sync) and then
//! notifies the hook, if any.
//!
//! Lifecycle events (connect, ready, resume, disconnect) are fully
//! serialized, hook notification included. Messages and interactions hold
//! the gate only while their routing decision is taken; the command handler
//! and the hook notification that follows it run after the gate is
//! released, so a slow command in one guild does not hold up the others.
//! Within one event the handler still finishes before the hook hears of it.
//!
//! ```text
//! Idle ──connect──▶ Connecting ──ready──▶ Ready ◀──▶ Errored
//!   ▲                                       │
//!   └──────── connect ── Disconnected ◀─────┘ disconnect / error
//! ```

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use hb_core::ErrorStyle;
use serenity::model::id::UserId;
use tracing::{debug, error, info, warn};

use crate::commands::{CommandContext, CommandEntry, CommandError, CommandKind, CommandRegistry};
use crate::event::{DisconnectReason, InboundInteraction, InboundMessage, InteractionKind, ReadyInfo};
use crate::gateway::{GatewayClient, Reply};
use crate::hook::{Hook, HookResult};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Connecting,
    Ready,
    /// Last command failed; the session keeps running
    Errored,
    Disconnected,
}

impl LifecycleState {
    fn accepts_dispatch(self) -> bool {
        matches!(self, Self::Connecting | Self::Ready | Self::Errored)
    }
}

/// Tunables taken from [`hb_core::DiscordConfig`]
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub error_style: ErrorStyle,
    pub sync_on_ready: bool,
    /// Bound for calls to the platform made by the dispatcher itself
    pub remote_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            error_style: ErrorStyle::Plain,
            sync_on_ready: true,
            remote_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&hb_core::DiscordConfig> for DispatchSettings {
    fn from(config: &hb_core::DiscordConfig) -> Self {
        Self {
            error_style: config.error_style,
            sync_on_ready: config.sync_on_ready,
            remote_timeout: config.remote_timeout(),
        }
    }
}

pub struct Dispatcher {
    registry: Arc<RwLock<CommandRegistry>>,
    gateway: Arc<dyn GatewayClient>,
    hook: RwLock<Option<Arc<dyn Hook>>>,
    settings: DispatchSettings,
    state: Mutex<LifecycleState>,
    bot_id: Mutex<Option<UserId>>,
    gate: tokio::sync::Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<RwLock<CommandRegistry>>,
        gateway: Arc<dyn GatewayClient>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry,
            gateway,
            hook: RwLock::new(None),
            settings,
            state: Mutex::new(LifecycleState::Idle),
            bot_id: Mutex::new(None),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Attach (or replace) the hook
    pub fn set_hook(&self, hook: Arc<dyn Hook>) {
        *self.hook.write().unwrap_or_else(|e| e.into_inner()) = Some(hook);
    }

    pub fn clear_hook(&self) {
        *self.hook.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The bot's own user id, known once ready
    pub fn bot_id(&self) -> Option<UserId> {
        *self.bot_id.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn registry(&self) -> &Arc<RwLock<CommandRegistry>> {
        &self.registry
    }

    /// Gateway connection is being (re)established
    ///
    /// A connect while already connecting is folded into the first one, so
    /// the hook sees one `on_connect` per attempt.
    pub async fn on_connect(&self) {
        let _turn = self.gate.lock().await;
        let previous = self.transition(LifecycleState::Connecting);
        match previous {
            LifecycleState::Connecting => {
                debug!("Already connecting");
                return;
            }
            LifecycleState::Idle | LifecycleState::Disconnected => {}
            _ => debug!("Connect while {:?}; treating as reconnect", previous),
        }
        info!("Discord session connecting");

        self.notify("on_connect", |hook| async move { hook.on_connect().await })
            .await;
    }

    pub async fn on_ready(&self, ready: ReadyInfo) {
        let _turn = self.gate.lock().await;
        let previous = self.transition(LifecycleState::Ready);
        if previous != LifecycleState::Connecting {
            warn!("Ready received while {:?}", previous);
        }
        *self.bot_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(ready.user_id);
        info!(
            "Logged in as {} (ID: {}) in {} guilds",
            ready.user_name, ready.user_id, ready.guild_count
        );

        if self.settings.sync_on_ready {
            self.sync_commands().await;
        }

        self.notify("on_setup", |hook| async move { hook.on_setup().await })
            .await;
        let ready = &ready;
        self.notify("on_ready", |hook| async move { hook.on_ready(ready).await })
            .await;
    }

    /// Gateway resumed a dropped session without a new ready
    pub async fn on_resumed(&self) {
        let _turn = self.gate.lock().await;
        let previous = self.transition(LifecycleState::Ready);
        if previous != LifecycleState::Connecting {
            warn!("Resume received while {:?}", previous);
        }
        info!("Discord session resumed");
    }

    pub async fn on_message(&self, message: InboundMessage) {
        let routed = {
            let _turn = self.gate.lock().await;
            if !self.accepting("message") {
                return;
            }
            if self.bot_id() == Some(message.author_id) {
                return;
            }

            let registry = self.registry.read().unwrap_or_else(|e| e.into_inner());
            registry.match_prefix(&message.content).map(|m| {
                let ctx = CommandContext::from_message(
                    &message,
                    &m.entry.name,
                    m.args,
                    self.gateway.clone(),
                    self.settings.remote_timeout,
                );
                (m.entry.clone(), ctx)
            })
        };

        if let Some((entry, ctx)) = routed {
            self.run_command(entry, ctx).await;
        }

        let message = &message;
        self.notify("on_message", |hook| async move { hook.on_message(message).await })
            .await;
    }

    pub async fn on_interaction(&self, interaction: InboundInteraction) {
        let routed = {
            let _turn = self.gate.lock().await;
            if !self.accepting("interaction") {
                return;
            }

            match &interaction.kind {
                InteractionKind::Command { name, options } => {
                    let entry = self
                        .registry
                        .read()
                        .unwrap_or_else(|e| e.into_inner())
                        .get(CommandKind::Interaction, name)
                        .cloned();
                    if entry.is_none() {
                        warn!("Interaction for unknown command /{}", name);
                    }
                    entry.map(|entry| {
                        let ctx = CommandContext::from_interaction(
                            &interaction,
                            name,
                            options,
                            self.gateway.clone(),
                            self.settings.remote_timeout,
                        );
                        (entry, ctx)
                    })
                }
                _ => None,
            }
        };

        if let Some((entry, ctx)) = routed {
            self.run_command(entry, ctx).await;
        }

        let interaction = &interaction;
        self.notify("on_interaction", |hook| async move {
            hook.on_interaction(interaction).await
        })
        .await;
    }

    /// Report a command failure to the invoker, then to the hook
    pub async fn on_command_error(&self, ctx: &CommandContext, error: CommandError) {
        let _turn = self.gate.lock().await;
        self.report_command_error(ctx, error).await;
    }

    pub async fn on_disconnect(&self, reason: DisconnectReason) {
        let _turn = self.gate.lock().await;
        let previous = self.transition(LifecycleState::Disconnected);
        if previous == LifecycleState::Disconnected {
            debug!("Already disconnected ({})", reason);
            return;
        }
        match &reason {
            DisconnectReason::Closed => info!("Discord session disconnected"),
            DisconnectReason::Error(e) => error!("Discord session terminated: {}", e),
        }

        let reason = &reason;
        self.notify("on_disconnect", |hook| async move {
            hook.on_disconnect(reason).await
        })
        .await;
    }

    pub async fn on_error_termination(&self, error: impl fmt::Display) {
        self.on_disconnect(DisconnectReason::Error(error.to_string()))
            .await;
    }

    async fn run_command(&self, entry: CommandEntry, ctx: CommandContext) {
        debug!("Dispatching {} command {}", entry.kind, entry.name);
        match entry.handler.call(ctx.clone()).await {
            Ok(()) => {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                if *state == LifecycleState::Errored {
                    *state = LifecycleState::Ready;
                }
            }
            Err(error) => self.report_command_error(&ctx, error).await,
        }
    }

    async fn report_command_error(&self, ctx: &CommandContext, error: CommandError) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state == LifecycleState::Ready {
                *state = LifecycleState::Errored;
            }
        }
        warn!("{} command {} failed: {}", ctx.kind, ctx.name, error);

        let reply = match self.settings.error_style {
            ErrorStyle::Plain => Reply::Text(format!("An error occurred: {}", error)),
            ErrorStyle::Embed => Reply::Error {
                title: "Error: Command failed".to_string(),
                description: error.to_string(),
            },
        };
        if let Err(e) = ctx.send(reply).await {
            error!("Failed to report command error for {}: {}", ctx.name, e);
        }

        let error = &*error;
        self.notify("on_command_error", |hook| async move {
            hook.on_command_error(ctx, error).await
        })
        .await;
    }

    async fn sync_commands(&self) {
        let specs = self
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .interaction_specs();

        match tokio::time::timeout(self.settings.remote_timeout, self.gateway.sync_commands(&specs))
            .await
        {
            Ok(Ok(published)) => {
                self.registry
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .mark_synced();
                info!("Commands synced with Discord ({} interaction commands)", published);
            }
            Ok(Err(e)) => error!("Command sync failed: {}", e),
            Err(_) => error!("Command sync timed out"),
        }
    }

    fn transition(&self, next: LifecycleState) -> LifecycleState {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let previous = *state;
        *state = next;
        debug!("Lifecycle {:?} -> {:?}", previous, next);
        previous
    }

    fn accepting(&self, event: &str) -> bool {
        let state = self.state();
        if !state.accepts_dispatch() {
            debug!("Dropping {} while {:?}", event, state);
            return false;
        }
        true
    }

    async fn notify<F, Fut>(&self, slot: &str, call: F)
    where
        F: FnOnce(Arc<dyn Hook>) -> Fut,
        Fut: Future<Output = HookResult>,
    {
        let hook = self.hook.read().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(hook) = hook {
            if let Err(e) = call(hook).await {
                warn!("Hook {} failed: {:#}", slot, e);
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state())
            .field("bot_id", &self.bot_id())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

//! Discord bot façade

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use hb_core::{Config, CredentialResolver, CredentialStore};
use serenity::gateway::ShardManager;
use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tracing::info;

use crate::client::SerenityGateway;
use crate::commands::{CommandHandler, CommandParam, CommandRegistry, CommandStyle};
use crate::dispatcher::{DispatchSettings, Dispatcher, LifecycleState};
use crate::error::{DiscordError, Result};
use crate::event::DisconnectReason;
use crate::handler::Handler;
use crate::hook::Hook;
use crate::voice::{DiscordVoice, VoiceManager};

/// Controls a running bot from outside its `start` loop
///
/// Cheap to clone; command handlers can hold one to reboot the bot.
#[derive(Clone, Default)]
pub struct BotHandle {
    shards: Arc<Mutex<Option<Arc<ShardManager>>>>,
    restart: Arc<AtomicBool>,
}

impl BotHandle {
    pub fn is_running(&self) -> bool {
        self.current().is_some()
    }

    /// Close the session and open a new one with the same credential
    pub async fn reboot(&self) -> Result<()> {
        let shards = self.current().ok_or(DiscordError::NotRunning)?;
        info!("Rebooting Discord session");
        self.restart.store(true, Ordering::SeqCst);
        shards.shutdown_all().await;
        Ok(())
    }

    /// Close the session and let `start` return
    pub async fn shutdown(&self) -> Result<()> {
        let shards = self.current().ok_or(DiscordError::NotRunning)?;
        info!("Shutting down Discord session");
        self.restart.store(false, Ordering::SeqCst);
        shards.shutdown_all().await;
        Ok(())
    }

    fn current(&self) -> Option<Arc<ShardManager>> {
        self.shards.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn attach(&self, shards: Option<Arc<ShardManager>>) {
        *self.shards.lock().unwrap_or_else(|e| e.into_inner()) = shards;
    }

    fn take_restart(&self) -> bool {
        self.restart.swap(false, Ordering::SeqCst)
    }
}

/// A Discord bot with a hook, a unified command registry and voice control
pub struct DiscordBot {
    resolver: CredentialResolver,
    registry: Arc<RwLock<CommandRegistry>>,
    dispatcher: Arc<Dispatcher>,
    gateway: Arc<SerenityGateway>,
    voice_backend: Arc<DiscordVoice>,
    voice: Arc<VoiceManager>,
    handle: BotHandle,
}

impl DiscordBot {
    /// Create a bot from configuration; nothing connects until [`start`](Self::start)
    pub fn new(config: &Config, store: CredentialStore) -> Result<Self> {
        let style = CommandStyle {
            prefix_commands: config.discord.prefix_commands,
            interaction_commands: config.discord.interaction_commands,
        };
        let registry = Arc::new(RwLock::new(CommandRegistry::new(
            &config.discord.prefix,
            style,
        )?));

        let gateway = Arc::new(SerenityGateway::new());
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            gateway.clone(),
            DispatchSettings::from(&config.discord),
        ));

        let voice_backend = Arc::new(DiscordVoice::new());
        let voice = Arc::new(VoiceManager::new(
            voice_backend.clone(),
            config.voice.operation_timeout(),
        ));

        Ok(Self {
            resolver: CredentialResolver::new(store),
            registry,
            dispatcher,
            gateway,
            voice_backend,
            voice,
            handle: BotHandle::default(),
        })
    }

    /// Load a credential into this instance before starting
    pub fn credentials_mut(&mut self) -> &mut CredentialResolver {
        &mut self.resolver
    }

    pub fn register_prefix_command(
        &self,
        name: &str,
        handler: impl CommandHandler + 'static,
    ) -> Result<()> {
        self.registry
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .register_prefix_command(name, handler)
    }

    pub fn register_interaction_command(
        &self,
        name: &str,
        description: &str,
        handler: impl CommandHandler + 'static,
        params: Vec<CommandParam>,
    ) -> Result<()> {
        self.registry
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .register_interaction_command(name, description, handler, params)
    }

    pub fn set_hook(&self, hook: Arc<dyn Hook>) {
        self.dispatcher.set_hook(hook);
    }

    pub fn clear_hook(&self) {
        self.dispatcher.clear_hook();
    }

    pub fn voice(&self) -> Arc<VoiceManager> {
        self.voice.clone()
    }

    pub fn registry(&self) -> &Arc<RwLock<CommandRegistry>> {
        &self.registry
    }

    pub fn state(&self) -> LifecycleState {
        self.dispatcher.state()
    }

    pub fn handle(&self) -> BotHandle {
        self.handle.clone()
    }

    /// Connect and run until the session ends
    ///
    /// The credential is resolved (explicit, then this instance's, then the
    /// shared store) before any connection is attempted. A reboot closes the
    /// session and reconnects without returning.
    pub async fn start(&mut self, explicit: Option<&str>) -> Result<()> {
        let credential = self.resolver.resolve(explicit)?;

        loop {
            info!("Starting Discord bot...");

            let builder = Client::builder(credential.expose(), intents())
                .event_handler(Handler::new(self.dispatcher.clone()));
            #[cfg(feature = "songbird")]
            let builder = {
                use songbird::SerenityInit;
                builder.register_songbird_with(self.voice_backend.songbird())
            };
            let mut client = builder.await?;

            self.gateway.bind(client.http.clone());
            self.voice_backend
                .bind(client.http.clone(), client.cache.clone());
            self.registry
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .mark_started();
            self.handle.attach(Some(client.shard_manager.clone()));

            // Shards only report stages from the handshake on
            self.dispatcher.on_connect().await;
            let outcome = client.start().await;
            self.handle.attach(None);

            match &outcome {
                Ok(()) => self.dispatcher.on_disconnect(DisconnectReason::Closed).await,
                Err(e) => self.dispatcher.on_error_termination(e).await,
            }

            if self.handle.take_restart() {
                continue;
            }
            return outcome.map_err(DiscordError::from);
        }
    }
}

fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_VOICE_STATES
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandKind, ParamKind};
    use crate::testing::{Journal, RecordingHandler};

    fn config(prefix: &str) -> Config {
        let mut config = Config::default();
        config.discord.prefix = prefix.to_string();
        config
    }

    #[tokio::test]
    async fn test_new_rejects_slash_prefix() {
        let result = DiscordBot::new(&config("/"), CredentialStore::new());
        assert!(matches!(result, Err(DiscordError::InvalidPrefix(_))));
    }

    #[tokio::test]
    async fn test_registration_reaches_registry() {
        let journal = Journal::default();
        let bot = DiscordBot::new(&config("?"), CredentialStore::new()).unwrap();

        bot.register_prefix_command("ping", RecordingHandler::new("ping", journal.clone()))
            .unwrap();
        bot.register_interaction_command(
            "play",
            "Play a file",
            RecordingHandler::new("play", journal.clone()),
            vec![CommandParam::new("file", "Path", ParamKind::String)],
        )
        .unwrap();

        let registry = bot.registry().read().unwrap();
        assert_eq!(registry.prefix(), "?");
        assert!(registry.get(CommandKind::Prefix, "ping").is_some());
        assert!(registry.get(CommandKind::Interaction, "play").is_some());
        assert!(registry.has_unsynced_changes());
    }

    #[tokio::test]
    async fn test_disabled_style_rejects_registration() {
        let mut cfg = config("!");
        cfg.discord.interaction_commands = false;
        let bot = DiscordBot::new(&cfg, CredentialStore::new()).unwrap();

        let result = bot.register_interaction_command(
            "ping",
            "Ping",
            RecordingHandler::new("ping", Journal::default()),
            vec![],
        );
        assert!(matches!(
            result,
            Err(DiscordError::StyleDisabled(CommandKind::Interaction))
        ));
    }

    #[tokio::test]
    async fn test_start_without_credential_fails_before_connecting() {
        let mut bot = DiscordBot::new(&config("!"), CredentialStore::new()).unwrap();
        let result = bot.start(None).await;
        assert!(matches!(
            result,
            Err(DiscordError::Credential(hb_core::Error::MissingCredential))
        ));
        assert_eq!(bot.state(), LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_reboot_when_not_running() {
        let bot = DiscordBot::new(&config("!"), CredentialStore::new()).unwrap();
        let handle = bot.handle();
        assert!(!handle.is_running());
        assert!(matches!(handle.reboot().await, Err(DiscordError::NotRunning)));
        assert!(matches!(handle.shutdown().await, Err(DiscordError::NotRunning)));
    }

    #[tokio::test]
    async fn test_voice_status_starts_disconnected() {
        let bot = DiscordBot::new(&config("!"), CredentialStore::new()).unwrap();
        let status = bot.voice().status(serenity::model::id::GuildId::new(1)).await;
        assert!(!status.connected);
    }
}

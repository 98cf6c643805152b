//! Serenity event handler feeding the [`Dispatcher`]

use std::sync::Arc;

use serenity::all::{
    CommandDataOption, CommandDataOptionValue, ConnectionStage, Context, EventHandler,
    Interaction, Message, Ready, ResumedEvent, ShardStageUpdateEvent,
};
use serenity::async_trait;
use tracing::debug;

use crate::commands::{CommandOption, OptionValue};
use crate::dispatcher::Dispatcher;
use crate::event::{DisconnectReason, InboundInteraction, InboundMessage, InteractionKind, ReadyInfo};

/// Converts serenity events into dispatcher events
pub struct Handler {
    dispatcher: Arc<Dispatcher>,
}

impl Handler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    async fn stage_changed(&self, old: ConnectionStage, new: ConnectionStage) {
        for event in stage_events(old, new) {
            match event {
                StageEvent::Connect => self.dispatcher.on_connect().await,
                StageEvent::Disconnect => {
                    self.dispatcher.on_disconnect(DisconnectReason::Closed).await
                }
            }
        }
    }
}

/// Lifecycle events implied by a shard stage change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StageEvent {
    Connect,
    Disconnect,
}

fn is_connecting(stage: ConnectionStage) -> bool {
    matches!(
        stage,
        ConnectionStage::Connecting
            | ConnectionStage::Handshake
            | ConnectionStage::Identifying
            | ConnectionStage::Resuming
    )
}

/// Map a shard stage change onto dispatcher events
///
/// Shards report `Handshake -> Identifying -> Connected` on a fresh session
/// and `Connected -> Resuming -> Connected` on a resume. Leaving `Connected`
/// is a disconnect; entering a connecting stage from outside one (or
/// identifying after the handshake) is a connect. Repeated connects are
/// folded by the dispatcher.
pub(crate) fn stage_events(old: ConnectionStage, new: ConnectionStage) -> Vec<StageEvent> {
    let mut events = Vec::new();
    if old == new {
        return events;
    }
    let left_session = old == ConnectionStage::Connected
        || (new == ConnectionStage::Disconnected && is_connecting(old));
    if left_session {
        events.push(StageEvent::Disconnect);
    }
    let identifying = old == ConnectionStage::Handshake && new == ConnectionStage::Identifying;
    if is_connecting(new) && (!is_connecting(old) || identifying) {
        events.push(StageEvent::Connect);
    }
    events
}

/// Map one option value; subcommands and attachments are not modelled
pub(crate) fn option_value(value: &CommandDataOptionValue) -> Option<OptionValue> {
    match value {
        CommandDataOptionValue::String(v) => Some(OptionValue::String(v.clone())),
        CommandDataOptionValue::Integer(v) => Some(OptionValue::Integer(*v)),
        CommandDataOptionValue::Number(v) => Some(OptionValue::Number(*v)),
        CommandDataOptionValue::Boolean(v) => Some(OptionValue::Boolean(*v)),
        CommandDataOptionValue::User(v) => Some(OptionValue::User(*v)),
        CommandDataOptionValue::Channel(v) => Some(OptionValue::Channel(*v)),
        CommandDataOptionValue::Role(v) => Some(OptionValue::Role(*v)),
        _ => None,
    }
}

fn command_options(options: &[CommandDataOption]) -> Vec<CommandOption> {
    options
        .iter()
        .filter_map(|option| {
            option_value(&option.value).map(|value| CommandOption {
                name: option.name.clone(),
                value,
            })
        })
        .collect()
}

fn inbound_message(msg: &Message) -> InboundMessage {
    InboundMessage {
        id: msg.id,
        channel_id: msg.channel_id,
        guild_id: msg.guild_id,
        author_id: msg.author.id,
        author_name: msg.author.name.clone(),
        content: msg.content.clone(),
    }
}

fn inbound_interaction(interaction: &Interaction) -> Option<InboundInteraction> {
    let inbound = match interaction {
        Interaction::Command(command) => InboundInteraction {
            id: command.id,
            token: command.token.clone(),
            kind: InteractionKind::Command {
                name: command.data.name.clone(),
                options: command_options(&command.data.options),
            },
            channel_id: Some(command.channel_id),
            guild_id: command.guild_id,
            user_id: command.user.id,
        },
        Interaction::Autocomplete(command) => InboundInteraction {
            id: command.id,
            token: command.token.clone(),
            kind: InteractionKind::Autocomplete {
                name: command.data.name.clone(),
            },
            channel_id: Some(command.channel_id),
            guild_id: command.guild_id,
            user_id: command.user.id,
        },
        Interaction::Component(component) => InboundInteraction {
            id: component.id,
            token: component.token.clone(),
            kind: InteractionKind::Component {
                custom_id: component.data.custom_id.clone(),
            },
            channel_id: Some(component.channel_id),
            guild_id: component.guild_id,
            user_id: component.user.id,
        },
        Interaction::Modal(modal) => InboundInteraction {
            id: modal.id,
            token: modal.token.clone(),
            kind: InteractionKind::Modal {
                custom_id: modal.data.custom_id.clone(),
            },
            channel_id: Some(modal.channel_id),
            guild_id: modal.guild_id,
            user_id: modal.user.id,
        },
        _ => return None,
    };
    Some(inbound)
}

#[async_trait]
impl EventHandler for Handler {
    async fn shard_stage_update(&self, _ctx: Context, event: ShardStageUpdateEvent) {
        debug!("Shard {:?} stage {:?} -> {:?}", event.shard_id, event.old, event.new);
        self.stage_changed(event.old, event.new).await;
    }

    async fn resume(&self, _ctx: Context, _event: ResumedEvent) {
        self.dispatcher.on_resumed().await;
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.dispatcher
            .on_ready(ReadyInfo {
                user_id: ready.user.id,
                user_name: ready.user.name.clone(),
                guild_count: ready.guilds.len(),
            })
            .await;
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        self.dispatcher.on_message(inbound_message(&msg)).await;
    }

    async fn interaction_create(&self, _ctx: Context, interaction: Interaction) {
        match inbound_interaction(&interaction) {
            Some(inbound) => self.dispatcher.on_interaction(inbound).await,
            None => debug!("Ignoring {:?} interaction", interaction.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use super::*;
    use crate::commands::{CommandRegistry, CommandStyle};
    use crate::dispatcher::{DispatchSettings, LifecycleState};
    use crate::testing::*;
    use serenity::model::id::{ChannelId, UserId};
    use serenity::all::ConnectionStage::*;

    fn dispatcher(journal: &Journal) -> Arc<Dispatcher> {
        let registry = CommandRegistry::new("!", CommandStyle::default()).unwrap();
        let dispatcher = Dispatcher::new(
            Arc::new(RwLock::new(registry)),
            Arc::new(RecordingGateway::new(journal.clone())),
            DispatchSettings::default(),
        );
        dispatcher.set_hook(Arc::new(RecordingHook::new(journal.clone())));
        Arc::new(dispatcher)
    }

    #[test]
    fn test_fresh_session_stages() {
        assert_eq!(stage_events(Disconnected, Handshake), vec![StageEvent::Connect]);
        assert_eq!(stage_events(Handshake, Identifying), vec![StageEvent::Connect]);
        assert!(stage_events(Identifying, Connected).is_empty());
        assert!(stage_events(Connected, Connected).is_empty());
    }

    #[test]
    fn test_resume_stages() {
        assert_eq!(
            stage_events(Connected, Resuming),
            vec![StageEvent::Disconnect, StageEvent::Connect]
        );
        assert!(stage_events(Resuming, Connected).is_empty());
        // Failed resume falls back to a fresh identify within the same attempt
        assert!(stage_events(Resuming, Identifying).is_empty());
    }

    #[test]
    fn test_dropped_stages() {
        assert_eq!(stage_events(Connected, Disconnected), vec![StageEvent::Disconnect]);
        assert_eq!(stage_events(Identifying, Disconnected), vec![StageEvent::Disconnect]);
        assert_eq!(
            stage_events(Connected, Handshake),
            vec![StageEvent::Disconnect, StageEvent::Connect]
        );
    }

    #[tokio::test]
    async fn test_stage_sequence_drives_lifecycle() {
        let journal = Journal::default();
        let dispatcher = dispatcher(&journal);
        let handler = Handler::new(dispatcher.clone());

        // Start-up announces the connect before the shard reports any stage
        dispatcher.on_connect().await;
        handler.stage_changed(Handshake, Identifying).await;
        handler.stage_changed(Identifying, Connected).await;
        dispatcher.on_ready(ready()).await;
        assert_eq!(journal.count("hook:connect"), 1);
        assert_eq!(dispatcher.state(), LifecycleState::Ready);

        handler.stage_changed(Connected, Resuming).await;
        assert_eq!(dispatcher.state(), LifecycleState::Connecting);
        handler.stage_changed(Resuming, Connected).await;
        dispatcher.on_resumed().await;

        assert_eq!(dispatcher.state(), LifecycleState::Ready);
        assert_eq!(journal.count("hook:connect"), 2);
        assert_eq!(journal.count("hook:disconnect:connection closed"), 1);
        assert_eq!(journal.count("hook:ready"), 1);
        let disconnect = journal.position("hook:disconnect").unwrap();
        let ready = journal.position("hook:ready").unwrap();
        assert!(ready < disconnect);
    }

    #[tokio::test]
    async fn test_dropped_session_reidentifies() {
        let journal = Journal::default();
        let dispatcher = dispatcher(&journal);
        let handler = Handler::new(dispatcher.clone());

        dispatcher.on_connect().await;
        handler.stage_changed(Handshake, Identifying).await;
        handler.stage_changed(Identifying, Connected).await;
        dispatcher.on_ready(ready()).await;

        handler.stage_changed(Connected, Disconnected).await;
        assert_eq!(dispatcher.state(), LifecycleState::Disconnected);
        handler.stage_changed(Disconnected, Handshake).await;
        handler.stage_changed(Handshake, Identifying).await;
        handler.stage_changed(Identifying, Connected).await;
        dispatcher.on_ready(ready()).await;

        assert_eq!(dispatcher.state(), LifecycleState::Ready);
        assert_eq!(journal.count("hook:connect"), 2);
        assert_eq!(journal.count("hook:disconnect"), 1);
        assert_eq!(journal.count("hook:ready"), 2);
    }

    #[test]
    fn test_option_values() {
        assert_eq!(
            option_value(&CommandDataOptionValue::String("song.mp3".to_string())),
            Some(OptionValue::String("song.mp3".to_string()))
        );
        assert_eq!(
            option_value(&CommandDataOptionValue::Channel(ChannelId::new(5))),
            Some(OptionValue::Channel(ChannelId::new(5)))
        );
        assert_eq!(
            option_value(&CommandDataOptionValue::User(UserId::new(6))),
            Some(OptionValue::User(UserId::new(6)))
        );
        assert_eq!(
            option_value(&CommandDataOptionValue::SubCommand(vec![])),
            None
        );
    }
}

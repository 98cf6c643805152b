use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{CommandEntry, CommandHandler, CommandKind, CommandParam, CommandSpec};
use crate::error::{DiscordError, Result};

/// Interaction names and descriptions are capped by the platform
const MAX_INTERACTION_NAME: usize = 32;
const MAX_DESCRIPTION: usize = 100;
const MAX_PARAMS: usize = 25;

/// Which command kinds a bot accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStyle {
    pub prefix_commands: bool,
    pub interaction_commands: bool,
}

impl Default for CommandStyle {
    fn default() -> Self {
        Self {
            prefix_commands: true,
            interaction_commands: true,
        }
    }
}

impl CommandStyle {
    pub fn allows(&self, kind: CommandKind) -> bool {
        match kind {
            CommandKind::Prefix => self.prefix_commands,
            CommandKind::Interaction => self.interaction_commands,
        }
    }
}

/// Result of matching a message against the prefix commands
#[derive(Debug)]
pub struct PrefixMatch<'a> {
    pub entry: &'a CommandEntry,
    /// Remainder after the command name, leading whitespace removed
    pub args: &'a str,
}

/// One name-keyed command tree, partitioned by kind
///
/// Interaction commands reach the platform only when the tree is synced,
/// which happens once per ready. A command registered after the session
/// started is dispatched locally right away but stays invisible in the
/// client's slash-command picker until the next ready (reconnect or
/// reboot). [`has_unsynced_changes`](Self::has_unsynced_changes) reports
/// that gap.
#[derive(Debug)]
pub struct CommandRegistry {
    prefix: String,
    style: CommandStyle,
    prefix_commands: HashMap<String, CommandEntry>,
    interaction_commands: HashMap<String, CommandEntry>,
    started: bool,
    unsynced: bool,
}

impl CommandRegistry {
    /// Create an empty registry
    ///
    /// `/` is reserved for interaction commands and a prefix may not contain
    /// whitespace. An empty prefix matches the first word of every message.
    pub fn new(prefix: impl Into<String>, style: CommandStyle) -> Result<Self> {
        let prefix = prefix.into();
        if prefix == "/" || prefix.chars().any(char::is_whitespace) {
            return Err(DiscordError::InvalidPrefix(prefix));
        }

        Ok(Self {
            prefix,
            style,
            prefix_commands: HashMap::new(),
            interaction_commands: HashMap::new(),
            started: false,
            unsynced: false,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn style(&self) -> CommandStyle {
        self.style
    }

    /// Register a prefix (text) command
    pub fn register_prefix_command(
        &mut self,
        name: &str,
        handler: impl CommandHandler + 'static,
    ) -> Result<()> {
        self.ensure_enabled(CommandKind::Prefix)?;
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(DiscordError::InvalidCommand(format!(
                "prefix command name {:?} must be a single non-empty word",
                name
            )));
        }
        if self.prefix_commands.contains_key(name) {
            return Err(DiscordError::DuplicateCommand {
                kind: CommandKind::Prefix,
                name: name.to_string(),
            });
        }

        self.prefix_commands.insert(
            name.to_string(),
            CommandEntry {
                name: name.to_string(),
                kind: CommandKind::Prefix,
                description: String::new(),
                handler: Arc::new(handler),
                params: Vec::new(),
            },
        );
        debug!("Registered prefix command {}{}", self.prefix, name);
        Ok(())
    }

    /// Register an interaction (slash) command
    pub fn register_interaction_command(
        &mut self,
        name: &str,
        description: &str,
        handler: impl CommandHandler + 'static,
        params: Vec<CommandParam>,
    ) -> Result<()> {
        self.ensure_enabled(CommandKind::Interaction)?;
        validate_interaction_name(name)?;
        validate_description(name, description)?;
        validate_params(name, &params)?;
        if self.interaction_commands.contains_key(name) {
            return Err(DiscordError::DuplicateCommand {
                kind: CommandKind::Interaction,
                name: name.to_string(),
            });
        }

        self.interaction_commands.insert(
            name.to_string(),
            CommandEntry {
                name: name.to_string(),
                kind: CommandKind::Interaction,
                description: description.to_string(),
                handler: Arc::new(handler),
                params,
            },
        );
        self.unsynced = true;

        if self.started {
            warn!(
                "Interaction command /{} registered after session start; it will be published on the next ready",
                name
            );
        } else {
            debug!("Registered interaction command /{}", name);
        }
        Ok(())
    }

    pub fn get(&self, kind: CommandKind, name: &str) -> Option<&CommandEntry> {
        match kind {
            CommandKind::Prefix => self.prefix_commands.get(name),
            CommandKind::Interaction => self.interaction_commands.get(name),
        }
    }

    /// Match message text against the prefix commands
    ///
    /// Strips the prefix, splits on the first whitespace run and compares the
    /// head token case-sensitively. Plain conversation yields `None`.
    pub fn match_prefix<'a>(&'a self, content: &'a str) -> Option<PrefixMatch<'a>> {
        if !self.style.prefix_commands {
            return None;
        }

        let rest = content.strip_prefix(self.prefix.as_str())?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim_start()),
            None => (rest, ""),
        };
        if head.is_empty() {
            return None;
        }

        self.prefix_commands
            .get(head)
            .map(|entry| PrefixMatch { entry, args })
    }

    /// Snapshot of the interaction tree, sorted by name
    pub fn interaction_specs(&self) -> Vec<CommandSpec> {
        let mut specs: Vec<CommandSpec> = self
            .interaction_commands
            .values()
            .map(CommandSpec::from)
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn names(&self, kind: CommandKind) -> Vec<&str> {
        let map = match kind {
            CommandKind::Prefix => &self.prefix_commands,
            CommandKind::Interaction => &self.interaction_commands,
        };
        let mut names: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.prefix_commands.len() + self.interaction_commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Interaction commands changed since the last successful sync
    pub fn has_unsynced_changes(&self) -> bool {
        self.unsynced
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    pub(crate) fn mark_synced(&mut self) {
        self.unsynced = false;
    }

    fn ensure_enabled(&self, kind: CommandKind) -> Result<()> {
        if self.style.allows(kind) {
            Ok(())
        } else {
            Err(DiscordError::StyleDisabled(kind))
        }
    }
}

fn validate_interaction_name(name: &str) -> Result<()> {
    let valid_chars = name
        .chars()
        .all(|c| (c.is_alphanumeric() && !c.is_uppercase()) || c == '-' || c == '_');
    let len = name.chars().count();

    if len == 0 || len > MAX_INTERACTION_NAME || !valid_chars {
        return Err(DiscordError::InvalidCommand(format!(
            "interaction name {:?} must be 1-{} lowercase letters, digits, '-' or '_'",
            name, MAX_INTERACTION_NAME
        )));
    }
    Ok(())
}

fn validate_description(owner: &str, description: &str) -> Result<()> {
    let len = description.chars().count();
    if len == 0 || len > MAX_DESCRIPTION {
        return Err(DiscordError::InvalidCommand(format!(
            "description for '{}' must be 1-{} characters",
            owner, MAX_DESCRIPTION
        )));
    }
    Ok(())
}

fn validate_params(command: &str, params: &[CommandParam]) -> Result<()> {
    if params.len() > MAX_PARAMS {
        return Err(DiscordError::InvalidCommand(format!(
            "'{}' has {} parameters (max {})",
            command,
            params.len(),
            MAX_PARAMS
        )));
    }

    let mut seen_optional = false;
    for (i, param) in params.iter().enumerate() {
        validate_interaction_name(&param.name)?;
        validate_description(&param.name, &param.description)?;

        if params[..i].iter().any(|p| p.name == param.name) {
            return Err(DiscordError::InvalidCommand(format!(
                "'{}' declares parameter '{}' twice",
                command, param.name
            )));
        }
        if param.required && seen_optional {
            return Err(DiscordError::InvalidCommand(format!(
                "required parameter '{}' of '{}' follows an optional one",
                param.name, command
            )));
        }
        seen_optional |= !param.required;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ParamKind;
    use crate::testing::{Journal, RecordingHandler};

    fn registry() -> CommandRegistry {
        CommandRegistry::new("!", CommandStyle::default()).unwrap()
    }

    fn handler(label: &str) -> RecordingHandler {
        RecordingHandler::new(label, Journal::default())
    }

    #[test]
    fn test_slash_prefix_is_rejected() {
        assert!(matches!(
            CommandRegistry::new("/", CommandStyle::default()),
            Err(DiscordError::InvalidPrefix(_))
        ));
        assert!(CommandRegistry::new("! ", CommandStyle::default()).is_err());
        assert!(CommandRegistry::new("", CommandStyle::default()).is_ok());
        assert!(CommandRegistry::new("//", CommandStyle::default()).is_ok());
    }

    #[test]
    fn test_same_name_across_kinds() {
        let mut registry = registry();
        registry.register_prefix_command("ping", handler("prefix")).unwrap();
        registry
            .register_interaction_command("ping", "Pong!", handler("slash"), vec![])
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(CommandKind::Prefix, "ping").unwrap().kind, CommandKind::Prefix);
        assert_eq!(
            registry.get(CommandKind::Interaction, "ping").unwrap().kind,
            CommandKind::Interaction
        );
    }

    #[test]
    fn test_duplicate_within_kind() {
        let mut registry = registry();
        registry.register_prefix_command("ping", handler("a")).unwrap();
        let err = registry.register_prefix_command("ping", handler("b")).unwrap_err();
        assert!(matches!(err, DiscordError::DuplicateCommand { kind: CommandKind::Prefix, .. }));
    }

    #[test]
    fn test_match_prefix() {
        let mut registry = registry();
        registry.register_prefix_command("echo", handler("echo")).unwrap();

        let matched = registry.match_prefix("!echo   hello  world").unwrap();
        assert_eq!(matched.entry.name, "echo");
        assert_eq!(matched.args, "hello  world");

        let matched = registry.match_prefix("!echo").unwrap();
        assert_eq!(matched.args, "");

        let matched = registry.match_prefix("!echo\tline").unwrap();
        assert_eq!(matched.args, "line");
    }

    #[test]
    fn test_match_prefix_misses() {
        let mut registry = registry();
        registry.register_prefix_command("echo", handler("echo")).unwrap();

        assert!(registry.match_prefix("echo hello").is_none());
        assert!(registry.match_prefix("!Echo hello").is_none());
        assert!(registry.match_prefix("! echo").is_none());
        assert!(registry.match_prefix("!").is_none());
        assert!(registry.match_prefix("!echoes").is_none());
        assert!(registry.match_prefix("just chatting").is_none());
    }

    #[test]
    fn test_empty_prefix_matches_first_word() {
        let mut registry = CommandRegistry::new("", CommandStyle::default()).unwrap();
        registry.register_prefix_command("roll", handler("roll")).unwrap();
        assert_eq!(registry.match_prefix("roll d20").unwrap().args, "d20");
        assert!(registry.match_prefix("let's roll").is_none());
    }

    #[test]
    fn test_disabled_style() {
        let style = CommandStyle {
            prefix_commands: false,
            interaction_commands: true,
        };
        let mut registry = CommandRegistry::new("!", style).unwrap();
        assert!(matches!(
            registry.register_prefix_command("ping", handler("p")),
            Err(DiscordError::StyleDisabled(CommandKind::Prefix))
        ));
        assert!(registry.match_prefix("!ping").is_none());
        registry
            .register_interaction_command("ping", "Pong!", handler("s"), vec![])
            .unwrap();
    }

    #[test]
    fn test_interaction_validation() {
        let mut registry = registry();
        assert!(registry
            .register_interaction_command("Ping", "Pong!", handler("s"), vec![])
            .is_err());
        assert!(registry
            .register_interaction_command("ping pong", "Pong!", handler("s"), vec![])
            .is_err());
        assert!(registry
            .register_interaction_command("ping", "", handler("s"), vec![])
            .is_err());
        assert!(registry
            .register_interaction_command(&"a".repeat(33), "Too long", handler("s"), vec![])
            .is_err());

        let params = vec![
            CommandParam::new("volume", "Playback volume", ParamKind::Integer).optional(),
            CommandParam::new("file", "Audio file", ParamKind::String),
        ];
        assert!(registry
            .register_interaction_command("play", "Play audio", handler("s"), params)
            .is_err());

        let params = vec![
            CommandParam::new("file", "Audio file", ParamKind::String),
            CommandParam::new("file", "Audio file again", ParamKind::String),
        ];
        assert!(registry
            .register_interaction_command("play", "Play audio", handler("s"), params)
            .is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_interaction_specs_sorted() {
        let mut registry = registry();
        registry
            .register_interaction_command("stop", "Stop playback", handler("s"), vec![])
            .unwrap();
        registry
            .register_interaction_command(
                "play",
                "Play audio",
                handler("p"),
                vec![CommandParam::new("file", "Audio file", ParamKind::String)],
            )
            .unwrap();
        registry.register_prefix_command("ping", handler("x")).unwrap();

        let specs = registry.interaction_specs();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["play", "stop"]);
        assert_eq!(specs[0].params.len(), 1);
        assert_eq!(registry.names(CommandKind::Prefix), vec!["ping"]);
    }

    #[test]
    fn test_unsynced_tracking() {
        let mut registry = registry();
        assert!(!registry.has_unsynced_changes());

        registry.register_prefix_command("ping", handler("p")).unwrap();
        assert!(!registry.has_unsynced_changes());

        registry
            .register_interaction_command("ping", "Pong!", handler("s"), vec![])
            .unwrap();
        assert!(registry.has_unsynced_changes());

        registry.mark_synced();
        registry.mark_started();
        assert!(!registry.has_unsynced_changes());

        registry
            .register_interaction_command("late", "Registered late", handler("l"), vec![])
            .unwrap();
        assert!(registry.has_unsynced_changes());
    }
}

//! Unified command model
//!
//! Prefix commands (`!ping`) and interaction commands (`/ping`) live in one
//! [`CommandRegistry`], partitioned by [`CommandKind`]. A name only has to be
//! unique within its kind.

mod context;
mod registry;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, RoleId, UserId};

pub use context::CommandContext;
pub use registry::{CommandRegistry, CommandStyle, PrefixMatch};

/// Error returned by a command handler
pub type CommandError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by a command handler
pub type CommandResult = std::result::Result<(), CommandError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Prefix,
    Interaction,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix => f.write_str("prefix"),
            Self::Interaction => f.write_str("interaction"),
        }
    }
}

/// Type of an interaction command parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
}

/// Interaction command parameter definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParam {
    pub name: String,
    pub description: String,
    pub kind: ParamKind,
    pub required: bool,
}

impl CommandParam {
    /// A required parameter
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Value supplied for an interaction parameter
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    User(UserId),
    Channel(ChannelId),
    Role(RoleId),
}

/// Named parameter value received with an interaction
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOption {
    pub name: String,
    pub value: OptionValue,
}

/// Code run when a command is invoked
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn call(&self, ctx: CommandContext) -> CommandResult;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(CommandContext) -> Fut + Send + Sync,
    Fut: Future<Output = CommandResult> + Send + 'static,
{
    async fn call(&self, ctx: CommandContext) -> CommandResult {
        (self)(ctx).await
    }
}

/// A registered command
#[derive(Clone)]
pub struct CommandEntry {
    pub name: String,
    pub kind: CommandKind,
    pub description: String,
    pub handler: Arc<dyn CommandHandler>,
    pub params: Vec<CommandParam>,
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("description", &self.description)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Interaction command as published to the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<CommandParam>,
}

impl From<&CommandEntry> for CommandSpec {
    fn from(entry: &CommandEntry) -> Self {
        Self {
            name: entry.name.clone(),
            description: entry.description.clone(),
            params: entry.params.clone(),
        }
    }
}

//! Configuration management
//!
//! Settings are read in this order of precedence:
//! 1. Environment variables
//! 2. `hookbot.toml`
//! 3. Defaults
//!
//! `${VAR_NAME}` inside the TOML file is replaced with the variable's value
//! before parsing.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credential::CredentialSource;
use crate::Error;

/// Default config file looked up by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "hookbot.toml";

/// How a failing command is reported back to the user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStyle {
    /// `An error occurred: <error>`
    #[default]
    Plain,
    /// Red embed titled `Error: Command failed`
    Embed,
}

impl FromStr for ErrorStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" | "text" => Ok(Self::Plain),
            "embed" => Ok(Self::Embed),
            other => Err(Error::Config(format!("Unknown error style: {}", other))),
        }
    }
}

/// Discord session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Inline bot token
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// File containing only the bot token
    pub token_file: Option<PathBuf>,

    /// Environment variable holding the bot token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// TOML/JSON document holding the token under `token_config_key`
    pub token_config_path: Option<PathBuf>,

    #[serde(default = "default_token_config_key")]
    pub token_config_key: String,

    /// Secret store entry holding the token
    pub secret_name: Option<String>,

    /// Prefix for text commands
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Whether prefix text commands are enabled
    #[serde(default = "default_true")]
    pub prefix_commands: bool,

    /// Whether interaction (slash) commands are enabled
    #[serde(default = "default_true")]
    pub interaction_commands: bool,

    /// How command failures are reported to the invoker
    #[serde(default)]
    pub error_style: ErrorStyle,

    /// Publish the interaction command tree on every ready
    #[serde(default = "default_true")]
    pub sync_on_ready: bool,

    /// Upper bound for command-tree sync and error replies
    #[serde(default = "default_remote_timeout")]
    pub remote_timeout_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_file: None,
            token_env: default_token_env(),
            token_config_path: None,
            token_config_key: default_token_config_key(),
            secret_name: None,
            prefix: default_prefix(),
            prefix_commands: true,
            interaction_commands: true,
            error_style: ErrorStyle::Plain,
            sync_on_ready: true,
            remote_timeout_secs: default_remote_timeout(),
        }
    }
}

impl DiscordConfig {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs.max(1))
    }
}

/// Voice session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Upper bound for any single call into the voice backend
    #[serde(default = "default_voice_timeout")]
    pub operation_timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: default_voice_timeout(),
        }
    }
}

impl VoiceConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs.max(1))
    }
}

fn default_token_env() -> String {
    "DISCORD_BOT_TOKEN".to_string()
}

fn default_token_config_key() -> String {
    "token".to_string()
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_true() -> bool {
    true
}

fn default_voice_timeout() -> u64 {
    10
}

fn default_remote_timeout() -> u64 {
    10
}

/// Main configuration for hookbot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,

    #[serde(default)]
    pub voice: VoiceConfig,
}

impl Config {
    /// Replace `${VAR_NAME}` with the variable's value
    ///
    /// Unset variables expand to an empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load settings from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let expanded_content = Self::expand_env_vars(&toml_content);

        let mut cfg = Self::from_toml_str(&expanded_content)?;
        cfg.apply_env_overrides()?;

        Ok(cfg)
    }

    fn from_toml_str(content: &str) -> crate::Result<Self> {
        let toml: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        Self::from_toml_config(toml)
    }

    /// Load `./hookbot.toml` if it exists, otherwise the environment only
    pub fn load() -> crate::Result<Self> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        Self::from_env()
    }

    fn from_toml_config(toml: TomlConfig) -> crate::Result<Self> {
        let discord = toml.discord.unwrap_or_default();
        let defaults = DiscordConfig::default();

        let error_style = match discord.error_style {
            Some(style) => style.parse()?,
            None => defaults.error_style,
        };

        let discord_config = DiscordConfig {
            token: discord.token.filter(|t| !t.trim().is_empty()),
            token_file: discord.token_file,
            token_env: discord.token_env.unwrap_or(defaults.token_env),
            token_config_path: discord.token_config_path,
            token_config_key: discord.token_config_key.unwrap_or(defaults.token_config_key),
            secret_name: discord.secret_name,
            prefix: discord.prefix.unwrap_or(defaults.prefix),
            prefix_commands: discord.prefix_commands.unwrap_or(true),
            interaction_commands: discord.interaction_commands.unwrap_or(true),
            error_style,
            sync_on_ready: discord.sync_on_ready.unwrap_or(true),
            remote_timeout_secs: discord
                .remote_timeout_secs
                .unwrap_or(defaults.remote_timeout_secs),
        };

        let voice = toml.voice.unwrap_or_default();
        let voice_config = VoiceConfig {
            operation_timeout_secs: voice
                .operation_timeout_secs
                .unwrap_or_else(default_voice_timeout),
        };

        Ok(Config {
            discord: discord_config,
            voice: voice_config,
        })
    }

    fn apply_env_overrides(&mut self) -> crate::Result<()> {
        if let Ok(token) = std::env::var("DISCORD_BOT_TOKEN") {
            if !token.trim().is_empty() {
                self.discord.token = Some(token);
            }
        }
        if let Ok(path) = std::env::var("DISCORD_TOKEN_FILE") {
            if !path.is_empty() {
                self.discord.token_file = Some(PathBuf::from(path));
            }
        }
        if let Ok(prefix) = std::env::var("DISCORD_PREFIX") {
            self.discord.prefix = prefix;
        }
        if let Ok(style) = std::env::var("DISCORD_ERROR_STYLE") {
            if !style.is_empty() {
                self.discord.error_style = style.parse()?;
            }
        }
        if let Ok(secs) = std::env::var("VOICE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                self.voice.operation_timeout_secs = secs;
            }
        }

        Ok(())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// Configured credential sources, most specific first
    ///
    /// Order: inline token, token file, environment variable, config
    /// document, secret store.
    pub fn credential_sources(&self) -> Vec<CredentialSource> {
        let discord = &self.discord;
        let mut sources = Vec::new();

        if let Some(value) = &discord.token {
            sources.push(CredentialSource::Inline {
                value: value.clone(),
            });
        }
        if let Some(path) = &discord.token_file {
            sources.push(CredentialSource::File { path: path.clone() });
        }
        if !discord.token_env.is_empty() {
            sources.push(CredentialSource::Environment {
                name: discord.token_env.clone(),
            });
        }
        if let Some(path) = &discord.token_config_path {
            sources.push(CredentialSource::ConfigDocument {
                path: path.clone(),
                key: discord.token_config_key.clone(),
            });
        }
        if let Some(name) = &discord.secret_name {
            sources.push(CredentialSource::SecretStore { name: name.clone() });
        }

        sources
    }
}

// ============================================================================
// TOML file layout
// ============================================================================

#[derive(Debug, Deserialize)]
struct TomlConfig {
    discord: Option<TomlDiscordConfig>,
    voice: Option<TomlVoiceConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlDiscordConfig {
    token: Option<String>,
    token_file: Option<PathBuf>,
    token_env: Option<String>,
    token_config_path: Option<PathBuf>,
    token_config_key: Option<String>,
    secret_name: Option<String>,
    prefix: Option<String>,
    prefix_commands: Option<bool>,
    interaction_commands: Option<bool>,
    error_style: Option<String>,
    sync_on_ready: Option<bool>,
    remote_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlVoiceConfig {
    operation_timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discord_config_default() {
        let config = DiscordConfig::default();
        assert_eq!(config.prefix, "!");
        assert_eq!(config.token_env, "DISCORD_BOT_TOKEN");
        assert_eq!(config.token_config_key, "token");
        assert!(config.prefix_commands);
        assert!(config.interaction_commands);
        assert!(config.sync_on_ready);
        assert_eq!(config.error_style, ErrorStyle::Plain);
        assert_eq!(config.remote_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_voice_config_default() {
        let config = VoiceConfig::default();
        assert_eq!(config.operation_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_error_style_parse() {
        assert_eq!("embed".parse::<ErrorStyle>().unwrap(), ErrorStyle::Embed);
        assert_eq!(" Plain ".parse::<ErrorStyle>().unwrap(), ErrorStyle::Plain);
        assert!("fancy".parse::<ErrorStyle>().is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        unsafe {
            std::env::set_var("HOOKBOT_TEST_VAR", "test_value");
        }

        let result = Config::expand_env_vars("prefix_${HOOKBOT_TEST_VAR}_suffix");
        assert_eq!(result, "prefix_test_value_suffix");

        let result = Config::expand_env_vars("prefix_${HOOKBOT_NONEXISTENT_VAR}_suffix");
        assert_eq!(result, "prefix__suffix");

        unsafe {
            std::env::remove_var("HOOKBOT_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        assert_eq!(Config::expand_env_vars("cost: $5"), "cost: $5");
    }

    #[test]
    fn test_toml_config_parsing() {
        let toml_content = r#"
[discord]
token_file = "/run/secrets/discord"
token_env = "MY_BOT_TOKEN"
token_config_path = "creds.json"
token_config_key = "bot_token"
secret_name = "discord/bot"
prefix = "?"
interaction_commands = false
error_style = "embed"

[voice]
operation_timeout_secs = 3
"#;

        let config = Config::from_toml_str(toml_content).unwrap();
        assert!(config.discord.token.is_none());
        assert_eq!(config.discord.prefix, "?");
        assert!(config.discord.prefix_commands);
        assert!(!config.discord.interaction_commands);
        assert_eq!(config.discord.error_style, ErrorStyle::Embed);
        assert_eq!(config.voice.operation_timeout_secs, 3);

        let sources = config.credential_sources();
        assert_eq!(
            sources,
            vec![
                CredentialSource::File {
                    path: PathBuf::from("/run/secrets/discord")
                },
                CredentialSource::Environment {
                    name: "MY_BOT_TOKEN".to_string()
                },
                CredentialSource::ConfigDocument {
                    path: PathBuf::from("creds.json"),
                    key: "bot_token".to_string()
                },
                CredentialSource::SecretStore {
                    name: "discord/bot".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_inline_token_comes_first() {
        let config = Config::from_toml_str("[discord]\ntoken = \"abc\"\n").unwrap();
        let sources = config.credential_sources();
        assert_eq!(
            sources.first(),
            Some(&CredentialSource::Inline {
                value: "abc".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_error_style_is_rejected() {
        let result = Config::from_toml_str("[discord]\nerror_style = \"loud\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

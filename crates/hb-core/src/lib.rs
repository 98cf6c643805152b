//! hb-core: HookBot Core Library
//!
//! Credential resolution and configuration shared by the Discord
//! façade and the `hookbot` binary.

pub mod config;
pub mod credential;
pub mod error;

pub use config::{Config, DiscordConfig, ErrorStyle, VoiceConfig};
pub use credential::{
    Credential, CredentialResolver, CredentialSource, CredentialStore, NoSecretBackend,
    SecretBackend,
};
pub use error::{Error, Result};

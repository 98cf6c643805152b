//! Error types for hb-core

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for hb-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("No credential resolved: load one before starting the session")]
    MissingCredential,

    #[error("Credential is empty")]
    EmptyCredential,

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Key not found in credential document: {0}")]
    MissingKey(String),

    #[error("Environment variable not set: {0}")]
    MissingVariable(String),

    #[error("Unsupported credential source: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for hb-core
pub type Result<T> = std::result::Result<T, Error>;

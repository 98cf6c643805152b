//! Bot credential resolution
//!
//! A credential can be loaded from an inline string, a file, an environment
//! variable, a structured config document (TOML or JSON) or a secret store.
//! Every successful load becomes the resolver's instance credential and is
//! also published to the shared [`CredentialStore`] (last writer wins), so a
//! façade constructed later against the same store can start without loading
//! again.
//!
//! When a session starts, [`CredentialResolver::resolve`] picks the first
//! non-empty value in this order:
//! 1. the credential passed explicitly to `start`
//! 2. the resolver's instance credential
//! 3. the store's last resolved credential

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroize;

use crate::{Error, Result};

/// Opaque, non-empty bot token
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Trim `raw` and wrap it, rejecting empty input
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyCredential);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The raw token, for handing to the gateway client
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Shared "last resolved credential" slot
///
/// Cloning shares the slot. [`CredentialStore::process`] is the process-wide
/// instance for call sites that cannot be handed a store explicitly.
#[derive(Clone, Default)]
pub struct CredentialStore {
    last: Arc<RwLock<Option<Credential>>>,
}

impl CredentialStore {
    /// Create an empty, independent store
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide store
    pub fn process() -> &'static CredentialStore {
        static PROCESS: OnceLock<CredentialStore> = OnceLock::new();
        PROCESS.get_or_init(CredentialStore::new)
    }

    /// The most recently published credential, if any
    pub fn last_resolved(&self) -> Option<Credential> {
        self.last
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the last resolved credential
    pub fn publish(&self, credential: &Credential) {
        *self
            .last
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(credential.clone());
    }

    /// Forget the last resolved credential
    pub fn clear(&self) {
        *self
            .last
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("resolved", &self.last_resolved().is_some())
            .finish()
    }
}

/// Name-keyed secret lookup (vault, cloud secret manager, keychain...)
pub trait SecretBackend: Send + Sync {
    /// Backend name used in log and error messages
    fn name(&self) -> &str;

    /// Fetch the raw secret stored under `name`
    fn fetch(&self, name: &str) -> Result<String>;
}

/// Default backend: every lookup fails with [`Error::Unsupported`]
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSecretBackend;

impl SecretBackend for NoSecretBackend {
    fn name(&self) -> &str {
        "none"
    }

    fn fetch(&self, name: &str) -> Result<String> {
        Err(Error::Unsupported(format!(
            "no secret store backend configured (requested secret '{}')",
            name
        )))
    }
}

/// Where a credential should be loaded from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CredentialSource {
    /// Inline token string
    Inline { value: String },
    /// Whole-file token
    File { path: PathBuf },
    /// Environment variable
    Environment { name: String },
    /// String value under `key` in a TOML or JSON document
    ConfigDocument { path: PathBuf, key: String },
    /// Secret store entry
    SecretStore { name: String },
}

impl CredentialSource {
    /// Short label for logs (never contains the secret)
    pub fn label(&self) -> String {
        match self {
            Self::Inline { .. } => "inline".to_string(),
            Self::File { path } => format!("file {}", path.display()),
            Self::Environment { name } => format!("env {}", name),
            Self::ConfigDocument { path, key } => format!("{} [{}]", path.display(), key),
            Self::SecretStore { name } => format!("secret {}", name),
        }
    }
}

/// Per-façade credential state bound to a shared [`CredentialStore`]
pub struct CredentialResolver {
    store: CredentialStore,
    instance: Option<Credential>,
    secrets: Arc<dyn SecretBackend>,
}

impl CredentialResolver {
    /// Create a resolver publishing into `store`
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            instance: None,
            secrets: Arc::new(NoSecretBackend),
        }
    }

    /// Use `backend` for [`from_secret_store`](Self::from_secret_store)
    pub fn with_secret_backend(mut self, backend: Arc<dyn SecretBackend>) -> Self {
        self.secrets = backend;
        self
    }

    /// The shared store this resolver publishes into
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// The instance credential, if one was loaded
    pub fn instance(&self) -> Option<&Credential> {
        self.instance.as_ref()
    }

    pub fn from_string(&mut self, raw: &str) -> Result<Credential> {
        let credential = Credential::new(raw)?;
        Ok(self.commit(credential, "inline"))
    }

    pub fn from_file(&mut self, path: impl AsRef<Path>) -> Result<Credential> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let credential = Credential::new(text)?;
        Ok(self.commit(credential, "file"))
    }

    pub fn from_environment(&mut self, name: &str) -> Result<Credential> {
        let value =
            std::env::var(name).map_err(|_| Error::MissingVariable(name.to_string()))?;
        let credential = Credential::new(value)?;
        Ok(self.commit(credential, "environment"))
    }

    /// Load the string stored under `key` in a TOML or JSON document
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as TOML.
    /// A dotted key (`discord.token`) walks nested tables when no top-level
    /// entry has that exact name.
    pub fn from_config(&mut self, path: impl AsRef<Path>, key: &str) -> Result<Credential> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document = parse_document(path, &text)?;
        let value = lookup_key(&document, key).ok_or_else(|| Error::MissingKey(key.to_string()))?;
        let raw = value
            .as_str()
            .ok_or_else(|| Error::Parse(format!("value under '{}' is not a string", key)))?;
        let credential = Credential::new(raw)?;
        Ok(self.commit(credential, "config document"))
    }

    pub fn from_secret_store(&mut self, name: &str) -> Result<Credential> {
        let raw = self.secrets.fetch(name)?;
        let credential = Credential::new(raw)?;
        let backend = self.secrets.name().to_string();
        Ok(self.commit(credential, &format!("secret store ({})", backend)))
    }

    /// Load from any [`CredentialSource`]
    pub fn from_source(&mut self, source: &CredentialSource) -> Result<Credential> {
        match source {
            CredentialSource::Inline { value } => self.from_string(value),
            CredentialSource::File { path } => self.from_file(path),
            CredentialSource::Environment { name } => self.from_environment(name),
            CredentialSource::ConfigDocument { path, key } => self.from_config(path, key),
            CredentialSource::SecretStore { name } => self.from_secret_store(name),
        }
    }

    /// Pick the credential a session should start with
    ///
    /// Explicit > instance > store. The winner becomes both the instance
    /// credential and the store's last resolved value.
    pub fn resolve(&mut self, explicit: Option<&str>) -> Result<Credential> {
        let explicit = explicit.and_then(|raw| Credential::new(raw).ok());
        let chosen = explicit
            .or_else(|| self.instance.clone())
            .or_else(|| self.store.last_resolved())
            .ok_or(Error::MissingCredential)?;

        self.instance = Some(chosen.clone());
        self.store.publish(&chosen);
        Ok(chosen)
    }

    fn commit(&mut self, credential: Credential, origin: &str) -> Credential {
        debug!("Credential loaded from {}", origin);
        self.store.publish(&credential);
        self.instance = Some(credential.clone());
        credential
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("instance", &self.instance)
            .field("store", &self.store)
            .field("secrets", &self.secrets.name())
            .finish()
    }
}

fn parse_document(path: &Path, text: &str) -> Result<serde_json::Value> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(text).map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))
    } else {
        toml::from_str(text).map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))
    }
}

fn lookup_key<'a>(document: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    if let Some(value) = document.get(key) {
        return Some(value);
    }
    if !key.contains('.') {
        return None;
    }
    key.split('.')
        .try_fold(document, |node, segment| node.get(segment))
}

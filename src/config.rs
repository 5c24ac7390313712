//! Configuration loading and persistence.
//!
//! Reads `config.json` from the config directory and applies environment
//! variable overrides. The VAPID private key is accepted from the file or
//! the environment but never written back to disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use std::{fs, path::Path, path::PathBuf};

use crate::constants::{DEFAULT_MAX_CONCURRENCY, DEFAULT_SEND_TIMEOUT, DEFAULT_TTL_SECS};
use crate::notifications::dispatch::DispatcherOptions;
use crate::notifications::push::{PushOptions, Urgency};
use crate::notifications::{VapidIdentity, VapidKeys, WebPushError};

const CONFIG_FILE: &str = "config.json";

/// Configuration for the clinic-push service.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// VAPID public key, base64url uncompressed point.
    pub vapid_public_key: String,
    /// VAPID private key, base64url raw scalar. Not serialized to disk.
    #[serde(skip_serializing)]
    pub vapid_private_key: String,
    /// Contact URI sent as the VAPID `sub` claim.
    pub vapid_subject: String,
    /// JSON file holding registered subscriptions.
    pub subscriptions_path: PathBuf,
    /// Per-request timeout in seconds.
    pub send_timeout_secs: u64,
    /// Push requests in flight per dispatch.
    pub max_concurrency: usize,
    /// Message TTL in seconds.
    pub ttl: u32,
    /// Delivery urgency.
    pub urgency: Urgency,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("vapid_public_key", &self.vapid_public_key)
            .field("vapid_private_key", &"<redacted>")
            .field("vapid_subject", &self.vapid_subject)
            .field("subscriptions_path", &self.subscriptions_path)
            .field("send_timeout_secs", &self.send_timeout_secs)
            .field("max_concurrency", &self.max_concurrency)
            .field("ttl", &self.ttl)
            .field("urgency", &self.urgency)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let subscriptions_path = Self::config_dir()
            .map(|dir| dir.join("subscriptions.json"))
            .unwrap_or_else(|_| PathBuf::from("subscriptions.json"));

        Self {
            vapid_public_key: String::new(),
            vapid_private_key: String::new(),
            vapid_subject: "mailto:saude@inteligente.mz".to_string(),
            subscriptions_path,
            send_timeout_secs: DEFAULT_SEND_TIMEOUT.as_secs(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            ttl: DEFAULT_TTL_SECS,
            urgency: Urgency::default(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path.
    ///
    /// Directory selection priority:
    /// 1. `CLINIC_PUSH_CONFIG_DIR` env var
    /// 2. Platform config dir (Linux: ~/.config/clinic-push)
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("CLINIC_PUSH_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("clinic-push"))
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_dir(&Self::config_dir()?)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Loads `config.json` from `dir`, or defaults if it does not exist.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup` (environment variable name -> value).
    ///
    /// Unparseable numeric or urgency values are an error rather than being
    /// silently ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(public_key) = lookup("VAPID_PUBLIC_KEY") {
            self.vapid_public_key = public_key;
        }
        if let Some(private_key) = lookup("VAPID_PRIVATE_KEY") {
            self.vapid_private_key = private_key;
        }
        if let Some(subject) = lookup("VAPID_SUBJECT") {
            self.vapid_subject = subject;
        }
        if let Some(path) = lookup("CLINIC_PUSH_SUBSCRIPTIONS") {
            self.subscriptions_path = PathBuf::from(path);
        }

        if let Some(timeout) = lookup("CLINIC_PUSH_SEND_TIMEOUT") {
            self.send_timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("CLINIC_PUSH_SEND_TIMEOUT is not a number: {timeout:?}"))?;
        }
        if let Some(max) = lookup("CLINIC_PUSH_MAX_CONCURRENCY") {
            self.max_concurrency = max
                .trim()
                .parse()
                .with_context(|| format!("CLINIC_PUSH_MAX_CONCURRENCY is not a number: {max:?}"))?;
        }
        if let Some(ttl) = lookup("CLINIC_PUSH_TTL") {
            self.ttl = ttl
                .trim()
                .parse()
                .with_context(|| format!("CLINIC_PUSH_TTL is not a number: {ttl:?}"))?;
        }
        if let Some(urgency) = lookup("CLINIC_PUSH_URGENCY") {
            self.urgency = urgency.parse()?;
        }
        Ok(())
    }

    /// Validated VAPID identity.
    ///
    /// Fails with [`WebPushError::Configuration`] when either key is
    /// missing or decodes to the wrong length, or the subject is not a
    /// `mailto:`/`https:` URI.
    pub fn vapid_identity(&self) -> Result<VapidIdentity, WebPushError> {
        let keys = VapidKeys::from_base64url(&self.vapid_public_key, &self.vapid_private_key)?;
        VapidIdentity::new(keys, self.vapid_subject.clone())
    }

    /// Dispatcher tunables.
    pub fn dispatcher_options(&self) -> DispatcherOptions {
        DispatcherOptions {
            send_timeout: Duration::from_secs(self.send_timeout_secs),
            max_concurrency: self.max_concurrency.max(1),
            push: PushOptions {
                ttl: self.ttl,
                urgency: self.urgency,
            },
        }
    }

    /// Persists the current configuration to `dir`.
    ///
    /// The private key is never written.
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).context("Failed to create config directory")?;
        let config_path = dir.join(CONFIG_FILE);
        fs::write(&config_path, serde_json::to_string_pretty(self)?)
            .context("Failed to write config file")?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Persists the current configuration to the config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to_dir(&Self::config_dir()?)
    }
}

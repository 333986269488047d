//! Configuration for gponctl.
//!
//! TOML file + `GPONCTL_` environment layering, the credential-key chain
//! (env → keyring → plaintext), and translation to
//! `gponctl_core::ControllerConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gponctl_api::{OidTable, TransportConfig};
use gponctl_core::{ControllerConfig, EngineConfig, Method};

/// Environment variable consulted after `encryption_key_env`.
pub const ENCRYPTION_KEY_ENV: &str = "GPONCTL_ENCRYPTION_KEY";

const KEYRING_SERVICE: &str = "gponctl";
const KEYRING_USER: &str = "encryption-key";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub timeouts: TimeoutSection,

    /// Vendor OID overrides; unset entries keep the built-in table.
    #[serde(default)]
    pub oids: OidTable,

    /// Inventory file. Defaults to `inventory.json` in the data dir.
    pub inventory: Option<PathBuf>,

    /// Credential key (plaintext; prefer keyring or env var).
    pub encryption_key: Option<String>,

    /// Environment variable name containing the credential key.
    pub encryption_key_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSection {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,

    /// `snmp`, `ssh` or `rest`.
    #[serde(default)]
    pub default_method: Method,

    /// Row cap for one unit enumeration.
    #[serde(default = "default_max_units")]
    pub max_units: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            task_timeout_secs: default_task_timeout(),
            default_method: Method::default(),
            max_units: default_max_units(),
        }
    }
}

fn default_poll_interval() -> u64 {
    30
}
fn default_task_timeout() -> u64 {
    120
}
fn default_max_units() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutSection {
    #[serde(default = "default_snmp_get")]
    pub snmp_get_secs: u64,
    #[serde(default = "default_snmp_walk")]
    pub snmp_walk_secs: u64,
    #[serde(default = "default_snmp_retries")]
    pub snmp_retries: u32,
    #[serde(default = "default_ssh_connect")]
    pub ssh_connect_secs: u64,
    #[serde(default = "default_ssh_command")]
    pub ssh_command_secs: u64,
    #[serde(default = "default_rest")]
    pub rest_secs: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            snmp_get_secs: default_snmp_get(),
            snmp_walk_secs: default_snmp_walk(),
            snmp_retries: default_snmp_retries(),
            ssh_connect_secs: default_ssh_connect(),
            ssh_command_secs: default_ssh_command(),
            rest_secs: default_rest(),
        }
    }
}

fn default_snmp_get() -> u64 {
    5
}
fn default_snmp_walk() -> u64 {
    10
}
fn default_snmp_retries() -> u32 {
    3
}
fn default_ssh_connect() -> u64 {
    10
}
fn default_ssh_command() -> u64 {
    30
}
fn default_rest() -> u64 {
    10
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "gponctl", "gponctl")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default inventory location.
pub fn default_inventory_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("inventory.json"),
        |dirs| dirs.data_dir().join("inventory.json"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("gponctl");
    p
}

impl Config {
    pub fn inventory_path(&self) -> PathBuf {
        self.inventory.clone().unwrap_or_else(default_inventory_path)
    }
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment keys nest with a double underscore:
/// `GPONCTL_ENGINE__POLL_INTERVAL_SECS=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("GPONCTL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential key resolution ───────────────────────────────────────

/// Resolve the credential key: `encryption_key_env` → `GPONCTL_ENCRYPTION_KEY`
/// → system keyring → plaintext in config. `None` means stored device
/// credentials are plain text.
pub fn resolve_encryption_key(config: &Config) -> Option<SecretString> {
    resolve_encryption_key_with(config, |name| std::env::var(name).ok(), keyring_key)
}

/// [`resolve_encryption_key`] with the environment and keyring injected.
pub fn resolve_encryption_key_with(
    config: &Config,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl FnOnce() -> Option<String>,
) -> Option<SecretString> {
    // 1. Configured env var
    if let Some(val) = config.encryption_key_env.as_deref().and_then(&env) {
        return Some(SecretString::from(val));
    }

    // 2. Well-known env var
    if let Some(val) = env(ENCRYPTION_KEY_ENV) {
        return Some(SecretString::from(val));
    }

    // 3. System keyring
    if let Some(val) = keyring() {
        return Some(SecretString::from(val));
    }

    // 4. Plaintext in config
    config
        .encryption_key
        .as_ref()
        .filter(|k| !k.is_empty())
        .map(|k| SecretString::from(k.clone()))
}

fn keyring_key() -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)
        .ok()?
        .get_password()
        .ok()
}

/// Store the credential key in the system keyring.
pub fn store_keyring_key(key: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?.set_password(key)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build the engine's `ControllerConfig` from the file config.
pub fn to_controller_config(config: &Config) -> Result<ControllerConfig, ConfigError> {
    let engine = &config.engine;
    positive("engine.poll_interval_secs", engine.poll_interval_secs)?;
    positive("engine.task_timeout_secs", engine.task_timeout_secs)?;
    if engine.max_units == 0 {
        return Err(ConfigError::Validation {
            field: "engine.max_units".into(),
            reason: "must be at least 1".into(),
        });
    }

    let t = &config.timeouts;
    for (field, secs) in [
        ("timeouts.snmp_get_secs", t.snmp_get_secs),
        ("timeouts.snmp_walk_secs", t.snmp_walk_secs),
        ("timeouts.ssh_connect_secs", t.ssh_connect_secs),
        ("timeouts.ssh_command_secs", t.ssh_command_secs),
        ("timeouts.rest_secs", t.rest_secs),
    ] {
        positive(field, secs)?;
    }

    Ok(ControllerConfig {
        engine: EngineConfig {
            poll_interval: Duration::from_secs(engine.poll_interval_secs),
            task_timeout: Duration::from_secs(engine.task_timeout_secs),
            default_method: engine.default_method,
        },
        transport: TransportConfig {
            snmp_get_timeout: Duration::from_secs(t.snmp_get_secs),
            snmp_walk_timeout: Duration::from_secs(t.snmp_walk_secs),
            snmp_retries: t.snmp_retries,
            max_rows: engine.max_units,
            ssh_connect_timeout: Duration::from_secs(t.ssh_connect_secs),
            ssh_command_timeout: Duration::from_secs(t.ssh_command_secs),
            rest_timeout: Duration::from_secs(t.rest_secs),
        },
        oids: config.oids.clone(),
        encryption_key: resolve_encryption_key(config),
    })
}

fn positive(field: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}

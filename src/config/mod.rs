//! Configuration management for `xray_porter`.
//!
//! Configuration sources and precedence (highest wins):
//! 1. CLI overrides
//! 2. Environment variables (`XRAY_*`, `JIRA_*`, `XPORT_*`)
//! 3. Project config (`./xport.yaml` or `--config PATH`)
//! 4. User config (`~/.config/xport/config.yaml`)
//! 5. Defaults
//!
//! All layers are flat string maps keyed by dotted names (`xray.url`,
//! `backup.poll-interval`). Typed [`Settings`] are resolved from the merged
//! layer; service credentials stay optional until a command needs them.

use crate::error::{Result, XportError};
use serde::Serialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project config filename looked up in the working directory.
pub const PROJECT_CONFIG_FILENAME: &str = "xport.yaml";
/// Cache file written by the metadata fetcher.
pub const DEFAULT_CACHE_FILENAME: &str = "jira_lookup_cache.json";

/// Classic environment variable names and the keys they feed.
const CLASSIC_ENV_KEYS: &[(&str, &str)] = &[
    ("XRAY_URL", "xray.url"),
    ("XRAY_ID", "xray.client-id"),
    ("XRAY_SECRET", "xray.client-secret"),
    ("JIRA_URL", "jira.url"),
    ("JIRA_EMAIL", "jira.email"),
    ("JIRA_TOKEN", "jira.token"),
];

/// Keys whose values are never printed in clear text.
const SECRET_KEYS: &[&str] = &["xray.client-secret", "jira.token"];

/// A configuration layer of normalized key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub values: HashMap<String, String>,
}

impl ConfigLayer {
    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        Ok(layer_from_yaml_value(&value))
    }

    /// Build a layer from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    /// Build a layer from an explicit set of environment-style variables.
    #[must_use]
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut layer = Self::default();

        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix("XPORT_") {
                insert_key_value(&mut layer, stripped, value);
            } else if let Some((_, target)) =
                CLASSIC_ENV_KEYS.iter().find(|(name, _)| *name == key)
            {
                insert_key_value(&mut layer, target, value);
            }
        }

        layer
    }

    /// Look up a value by any spelling of its key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&normalize_key(key))
            .map(String::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Set a value, normalizing the key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        insert_key_value(self, key, value.into());
    }
}

/// CLI overrides for config loading (optional).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub http_timeout: Option<u64>,
    pub output_dir: Option<PathBuf>,
    pub extract_dir: Option<PathBuf>,
    pub auto_delay: Option<u64>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();

        if let Some(timeout) = self.http_timeout {
            layer.set("http.timeout", timeout.to_string());
        }
        if let Some(dir) = &self.output_dir {
            layer.set("backup.output-dir", dir.to_string_lossy().to_string());
        }
        if let Some(dir) = &self.extract_dir {
            layer.set("backup.extract-dir", dir.to_string_lossy().to_string());
        }
        if let Some(delay) = self.auto_delay {
            layer.set("export.auto-delay", delay.to_string());
        }

        layer
    }
}

/// Default config layer (lowest precedence).
#[must_use]
pub fn default_config_layer() -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    for (key, value) in [
        ("backup.output-dir", "."),
        ("backup.cache-file", DEFAULT_CACHE_FILENAME),
        ("backup.poll-interval", "30"),
        ("metadata.batch-size", "50"),
        ("metadata.retry-delay", "10"),
        ("export.poll-attempts", "100"),
        ("export.poll-interval", "1"),
        ("export.auto-delay", "3"),
        ("http.timeout", "60"),
    ] {
        layer.set(key, value);
    }
    layer
}

/// Path of the user config file, if `HOME` is set.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    let home = env::var("HOME").ok()?;
    Some(
        Path::new(&home)
            .join(".config")
            .join("xport")
            .join("config.yaml"),
    )
}

/// Load user config (~/.config/xport/config.yaml).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<ConfigLayer> {
    match user_config_path() {
        Some(path) => ConfigLayer::from_yaml(&path),
        None => Ok(ConfigLayer::default()),
    }
}

/// Load the project config, either the explicit `--config` path or
/// `./xport.yaml`.
///
/// # Errors
///
/// Returns an error if an explicit path is missing, or the file cannot be
/// read or parsed.
pub fn load_project_config(explicit: Option<&Path>) -> Result<ConfigLayer> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(XportError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            ConfigLayer::from_yaml(path)
        }
        None => ConfigLayer::from_yaml(Path::new(PROJECT_CONFIG_FILENAME)),
    }
}

/// Load configuration with classic precedence order.
///
/// # Errors
///
/// Returns an error if any config file cannot be read or parsed.
pub fn load_config(cli: &CliOverrides) -> Result<ConfigLayer> {
    Ok(ConfigLayer::merge_layers(&[
        default_config_layer(),
        load_user_config()?,
        load_project_config(cli.config.as_deref())?,
        ConfigLayer::from_env(),
        cli.as_layer(),
    ]))
}

/// Load and resolve typed settings in one step.
///
/// # Errors
///
/// Returns an error if config cannot be loaded or a value is malformed.
pub fn load_settings(cli: &CliOverrides) -> Result<Settings> {
    Settings::from_layer(&load_config(cli)?)
}

/// Xray Cloud connection settings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct XraySettings {
    pub url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Jira connection settings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JiraSettings {
    pub url: Option<String>,
    pub email: Option<String>,
    pub token: Option<String>,
}

/// Where backups land and how the backup job is polled.
#[derive(Debug, Clone, Serialize)]
pub struct BackupSettings {
    pub output_dir: PathBuf,
    pub extract_dir: Option<PathBuf>,
    pub cache_file: String,
    #[serde(with = "secs")]
    pub poll_interval: Duration,
}

impl BackupSettings {
    /// Extraction target, defaulting to `<output>/xray-backup`.
    #[must_use]
    pub fn extract_dir(&self) -> PathBuf {
        self.extract_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("xray-backup"))
    }
}

/// Jira metadata batching.
#[derive(Debug, Clone, Serialize)]
pub struct MetadataSettings {
    pub batch_size: usize,
    #[serde(with = "secs")]
    pub retry_delay: Duration,
}

/// Export upload polling and automatic-mode pacing.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSettings {
    pub poll_attempts: u32,
    #[serde(with = "secs")]
    pub poll_interval: Duration,
    #[serde(with = "secs")]
    pub auto_delay: Duration,
}

/// Fully resolved settings.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub xray: XraySettings,
    pub jira: JiraSettings,
    pub backup: BackupSettings,
    pub metadata: MetadataSettings,
    pub export: ExportSettings,
    #[serde(with = "secs")]
    pub http_timeout: Duration,
}

impl Settings {
    /// Resolve typed settings from a merged layer.
    ///
    /// # Errors
    ///
    /// Returns `XportError::Config` when a numeric value does not parse.
    pub fn from_layer(layer: &ConfigLayer) -> Result<Self> {
        let owned = |key: &str| layer.get(key).map(str::to_string);

        let batch_size = parse_number::<usize>(layer, "metadata.batch-size", 50)?;
        if batch_size == 0 {
            return Err(XportError::Config(
                "metadata.batch-size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            xray: XraySettings {
                url: owned("xray.url").map(|url| trim_base_url(&url)),
                client_id: owned("xray.client-id"),
                client_secret: owned("xray.client-secret"),
            },
            jira: JiraSettings {
                url: owned("jira.url").map(|url| trim_base_url(&url)),
                email: owned("jira.email"),
                token: owned("jira.token"),
            },
            backup: BackupSettings {
                output_dir: PathBuf::from(layer.get("backup.output-dir").unwrap_or(".")),
                extract_dir: layer.get("backup.extract-dir").map(PathBuf::from),
                cache_file: owned("backup.cache-file")
                    .unwrap_or_else(|| DEFAULT_CACHE_FILENAME.to_string()),
                poll_interval: parse_secs(layer, "backup.poll-interval", 30)?,
            },
            metadata: MetadataSettings {
                batch_size,
                retry_delay: parse_secs(layer, "metadata.retry-delay", 10)?,
            },
            export: ExportSettings {
                poll_attempts: parse_number::<u32>(layer, "export.poll-attempts", 100)?,
                poll_interval: parse_secs(layer, "export.poll-interval", 1)?,
                auto_delay: parse_secs(layer, "export.auto-delay", 3)?,
            },
            http_timeout: parse_secs(layer, "http.timeout", 60)?,
        })
    }

    /// Flattened `(key, value)` view with secrets masked, sorted by key.
    #[must_use]
    pub fn masked_entries(&self) -> Vec<(String, String)> {
        let opt = |value: &Option<String>| value.clone().unwrap_or_default();
        let mut entries = vec![
            ("xray.url".to_string(), opt(&self.xray.url)),
            ("xray.client-id".to_string(), opt(&self.xray.client_id)),
            ("xray.client-secret".to_string(), opt(&self.xray.client_secret)),
            ("jira.url".to_string(), opt(&self.jira.url)),
            ("jira.email".to_string(), opt(&self.jira.email)),
            ("jira.token".to_string(), opt(&self.jira.token)),
            (
                "backup.output-dir".to_string(),
                self.backup.output_dir.display().to_string(),
            ),
            (
                "backup.extract-dir".to_string(),
                self.backup.extract_dir().display().to_string(),
            ),
            ("backup.cache-file".to_string(), self.backup.cache_file.clone()),
            (
                "backup.poll-interval".to_string(),
                self.backup.poll_interval.as_secs().to_string(),
            ),
            (
                "metadata.batch-size".to_string(),
                self.metadata.batch_size.to_string(),
            ),
            (
                "metadata.retry-delay".to_string(),
                self.metadata.retry_delay.as_secs().to_string(),
            ),
            (
                "export.poll-attempts".to_string(),
                self.export.poll_attempts.to_string(),
            ),
            (
                "export.poll-interval".to_string(),
                self.export.poll_interval.as_secs().to_string(),
            ),
            (
                "export.auto-delay".to_string(),
                self.export.auto_delay.as_secs().to_string(),
            ),
            (
                "http.timeout".to_string(),
                self.http_timeout.as_secs().to_string(),
            ),
        ];

        for (key, value) in &mut entries {
            if SECRET_KEYS.contains(&key.as_str()) {
                *value = mask_secret(value);
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

/// Require an optional setting, naming it in the error.
///
/// # Errors
///
/// Returns `XportError::MissingSetting` when the value is absent.
pub fn require<'a>(value: Option<&'a String>, key: &str) -> Result<&'a str> {
    value
        .map(String::as_str)
        .ok_or_else(|| XportError::missing_setting(key))
}

/// Replace all but the last two characters of a secret.
#[must_use]
pub fn mask_secret(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let count = value.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = value.chars().skip(count - 2).collect();
    format!("{}{tail}", "*".repeat(count - 2))
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn insert_key_value(layer: &mut ConfigLayer, key: &str, value: String) {
    layer.values.insert(normalize_key(key), value);
}

/// Lowercase, with `_` folded to `-` and `.` kept as the section separator.
///
/// Environment names have no dots, so `BACKUP_POLL_INTERVAL` is mapped by
/// treating the first underscore as the section separator.
fn normalize_key(key: &str) -> String {
    let lowered = key.trim().to_lowercase();
    if lowered.contains('.') {
        return lowered.replace('_', "-");
    }
    match lowered.split_once('_') {
        Some((section, rest)) => format!("{section}.{}", rest.replace('_', "-")),
        None => lowered,
    }
}

fn parse_number<T: std::str::FromStr>(layer: &ConfigLayer, key: &str, default: T) -> Result<T> {
    match layer.get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| XportError::Config(format!("{key}: expected a number, got '{raw}'"))),
        None => Ok(default),
    }
}

fn parse_secs(layer: &ConfigLayer, key: &str, default: u64) -> Result<Duration> {
    parse_number::<u64>(layer, key, default).map(Duration::from_secs)
}

fn layer_from_yaml_value(value: &serde_yaml::Value) -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    let mut flat = HashMap::new();
    flatten_yaml(value, "", &mut flat);

    for (key, value) in flat {
        insert_key_value(&mut layer, &key, value);
    }

    layer
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        serde_yaml::Value::Sequence(values) => {
            let joined = values
                .iter()
                .filter_map(yaml_scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}

mod secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}

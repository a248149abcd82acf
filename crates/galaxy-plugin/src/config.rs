//! Plugin configuration loaded from a JSON file.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use galaxy_rpc::DEFAULT_MAX_LINE_LENGTH;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Errors loading or saving the config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not determine the config directory")]
    NoConfigDir,
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    /// Longest accepted input line in bytes
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_line_length: default_max_line_length(),
        }
    }
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file; logs go to stderr when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// Messages a room accepts before sends fail with "too many messages"
    #[serde(default = "default_max_messages_per_room")]
    pub max_messages_per_room: usize,

    /// Sender id stamped on messages this plugin sends
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Rooms created at startup
    #[serde(default)]
    pub rooms: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_messages_per_room: default_max_messages_per_room(),
            user_id: default_user_id(),
            rooms: Vec::new(),
        }
    }
}

fn default_max_messages_per_room() -> usize {
    100
}

fn default_user_id() -> String {
    "me".to_string()
}

impl Config {
    /// Load config from file.
    ///
    /// A missing file yields the defaults. Keys this plugin does not know are
    /// ignored; use [`Config::load_checked`] to get them back.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_checked(path).map(|(config, _)| config)
    }

    /// Load config from file along with the paths of unknown keys
    /// (e.g. `chat.colour`), for the caller to report once logging is up.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid JSON.
    pub fn load_checked(path: &Path) -> Result<(Self, Vec<String>), ConfigError> {
        if !path.exists() {
            return Ok((Self::default(), Vec::new()));
        }

        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        let unknown = unknown_keys(&value, &expected_config_keys(), "");
        let config = serde_json::from_value(value)?;
        Ok((config, unknown))
    }

    /// Save config to file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Where the plugin looks for its config by default
#[derive(Debug, Clone)]
pub struct Directories {
    /// Config directory (~/.config/galaxy-chat-plugin)
    pub config: PathBuf,

    /// Config file path
    pub config_file: PathBuf,
}

impl Directories {
    /// Resolve the standard XDG paths.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigDir`] if no home directory can be found.
    pub fn new() -> Result<Self, ConfigError> {
        let project =
            ProjectDirs::from("", "", "galaxy-chat-plugin").ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::with_base(project.config_dir().to_path_buf()))
    }

    #[must_use]
    pub fn with_base(base: PathBuf) -> Self {
        Self {
            config_file: base.join("config.json"),
            config: base,
        }
    }
}

/// Log each unknown config key found by [`Config::load_checked`].
pub fn warn_unknown_fields(unknown: &[String], config_name: &str) {
    for path in unknown {
        warn!("Unknown config field in {config_name}: {path}");
    }
}

/// Dotted paths of keys in `value` that `known` does not list. Sections
/// are walked recursively; a non-object value has no keys to check.
fn unknown_keys(value: &Value, known: &KnownKeys, prefix: &str) -> Vec<String> {
    let Value::Object(obj) = value else {
        return Vec::new();
    };

    obj.iter()
        .flat_map(|(key, child)| {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };

            match known.sections.get(key.as_str()) {
                Some(section) => unknown_keys(child, section, &path),
                None if known.fields.contains(key.as_str()) => Vec::new(),
                None => vec![path],
            }
        })
        .collect()
}

/// Config keys at one nesting level: plain fields and nested sections
struct KnownKeys {
    fields: HashSet<&'static str>,
    sections: HashMap<&'static str, KnownKeys>,
}

impl KnownKeys {
    fn fields(fields: &[&'static str]) -> Self {
        Self {
            fields: fields.iter().copied().collect(),
            sections: HashMap::new(),
        }
    }

    fn section(mut self, key: &'static str, keys: KnownKeys) -> Self {
        self.sections.insert(key, keys);
        self
    }
}

fn expected_config_keys() -> KnownKeys {
    KnownKeys::fields(&[])
        .section("transport", KnownKeys::fields(&["maxLineLength"]))
        .section("logging", KnownKeys::fields(&["level", "file"]))
        .section(
            "chat",
            KnownKeys::fields(&["maxMessagesPerRoom", "userId", "rooms"]),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.transport.max_line_length, 16 * 1024 * 1024);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
        assert_eq!(config.chat.max_messages_per_room, 100);
        assert_eq!(config.chat.user_id, "me");
        assert!(config.chat.rooms.is_empty());
    }

    #[test]
    fn test_config_load_nonexistent_returns_default() {
        let path = Path::new("/nonexistent/path/config.json");
        let config = Config::load(path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_load_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"chat": {{"maxMessagesPerRoom": 5}}, "logging": {{"file": "/tmp/p.log"}}}}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.chat.max_messages_per_room, 5);
        assert_eq!(config.chat.user_id, "me");
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/p.log")));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_load_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{invalid json}}").unwrap();

        let result = Config::load(file.path());
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_config_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_unknown_fields_still_load() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"chat": {{"userId": "u1", "colour": "red"}}, "extra": 1}}"#).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.chat.user_id, "u1");
    }

    #[test]
    fn test_load_checked_returns_unknown_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"chat": {{"userId": "u1", "colour": "red"}}, "extra": 1, "transport": {{"maxLineLength": 64}}}}"#
        )
        .unwrap();

        let (config, mut unknown) = Config::load_checked(file.path()).unwrap();
        unknown.sort();
        assert_eq!(unknown, ["chat.colour", "extra"]);
        assert_eq!(config.chat.user_id, "u1");
        assert_eq!(config.transport.max_line_length, 64);
    }

    #[test]
    fn test_load_checked_missing_file_has_no_unknown_fields() {
        let path = Path::new("/nonexistent/path/config.json");
        let (config, unknown) = Config::load_checked(path).unwrap();
        assert_eq!(config, Config::default());
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.transport.max_line_length = 1024;

        config.save(file.path()).unwrap();
        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.transport.max_line_length, 1024);
    }

    #[test]
    fn test_unknown_keys_reports_paths() {
        let value: Value = serde_json::from_str(
            r#"{"chat": {"userId": "u1", "colour": "red"}, "extra": 1, "logging": {"level": "debug"}}"#,
        )
        .unwrap();

        let mut unknowns = unknown_keys(&value, &expected_config_keys(), "");
        unknowns.sort();
        assert_eq!(unknowns, ["chat.colour", "extra"]);
    }

    #[test]
    fn test_unknown_keys_ignores_non_object_sections() {
        let value: Value = serde_json::from_str(r#"{"chat": 5, "logging": []}"#).unwrap();
        assert!(unknown_keys(&value, &expected_config_keys(), "").is_empty());
    }

    #[test]
    fn test_with_base_sets_all_paths() {
        let base = PathBuf::from("/tmp/test-galaxy");
        let dirs = Directories::with_base(base.clone());

        assert_eq!(dirs.config, base);
        assert_eq!(dirs.config_file, base.join("config.json"));
    }
}

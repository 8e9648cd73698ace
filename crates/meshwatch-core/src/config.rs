//! Configuration loading and typed config structures for the relay.
//!
//! The configuration lives in `meshwatch-config.yaml`. Every field has a
//! default, so a missing file or a partial file is fine. A handful of
//! deployment settings can be overridden from the environment:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `HOST` | `server.host` |
//! | `PORT` | `server.port` |
//! | `ALLOWED_ORIGINS` | `server.allowed_origins` (comma separated) |
//! | `LISTENER_COMMAND` | `listener.program` + `listener.args` (whitespace separated) |

use std::collections::BTreeMap;
use std::path::Path;

use meshwatch_types::NodeId;
use serde::Deserialize;

use crate::history::MAX_MESSAGES;
use crate::registry::MAX_SUBSCRIBERS;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be interpreted.
    #[error("invalid value for {name}: {reason}")]
    InvalidOverride {
        /// Variable name.
        name: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MeshwatchConfig {
    /// HTTP / `WebSocket` server settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Upstream monitor process settings.
    #[serde(default)]
    pub listener: ListenerSettings,

    /// Capacity limits.
    #[serde(default)]
    pub limits: Limits,

    /// Display names for node ids, used in log output only.
    #[serde(default)]
    pub node_aliases: NodeAliases,
}

impl MeshwatchConfig {
    /// Load configuration from a YAML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] for a malformed override.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string (no environment overrides).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] for a malformed value.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] for a malformed value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            self.server.host = host.trim().to_owned();
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().map_err(|e| ConfigError::InvalidOverride {
                name: "PORT",
                reason: format!("{port:?}: {e}"),
            })?;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(command) = lookup("LISTENER_COMMAND") {
            let mut words = command.split_whitespace().map(str::to_owned);
            let program = words.next().ok_or_else(|| ConfigError::InvalidOverride {
                name: "LISTENER_COMMAND",
                reason: String::from("empty command"),
            })?;
            self.listener.program = program;
            self.listener.args = words.collect();
        }
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS origins. `*` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Maximum accepted request body size.
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    3000
}

fn default_allowed_origins() -> Vec<String> {
    vec![String::from("*")]
}

const fn default_body_limit_bytes() -> usize {
    10_485_760
}

/// Upstream monitor process settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenerSettings {
    /// Whether to spawn the monitor at all. Disable when records only
    /// arrive through the structured ingress.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Program to run.
    #[serde(default = "default_program")]
    pub program: String,

    /// Program arguments.
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Quiet period after which the record in progress is finalised.
    #[serde(default = "default_flush_idle_ms")]
    pub flush_idle_ms: u64,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            program: default_program(),
            args: default_args(),
            flush_idle_ms: default_flush_idle_ms(),
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_program() -> String {
    String::from("python3")
}

fn default_args() -> Vec<String> {
    vec![String::from("-u"), String::from("meshtastic_listener.py")]
}

const fn default_flush_idle_ms() -> u64 {
    750
}

/// Capacity limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Limits {
    /// Messages kept in the history ring.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Concurrent subscribers admitted.
    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,

    /// Events buffered per subscriber before it starts skipping.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            max_subscribers: default_max_subscribers(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

const fn default_max_messages() -> usize {
    MAX_MESSAGES
}

const fn default_max_subscribers() -> usize {
    MAX_SUBSCRIBERS
}

const fn default_broadcast_capacity() -> usize {
    256
}

/// Node id to display name table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct NodeAliases(BTreeMap<String, String>);

impl NodeAliases {
    /// Build from `(id, name)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Display name for a node, falling back to its id.
    pub fn display_name<'a>(&'a self, node: &'a NodeId) -> &'a str {
        self.0.get(node.as_str()).map_or(node.as_str(), String::as_str)
    }

    /// Display name for an optional node.
    pub fn display_optional<'a>(&'a self, node: Option<&'a NodeId>) -> &'a str {
        node.map_or("unknown", |n| self.display_name(n))
    }

    /// Number of configured aliases.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no aliases are configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = MeshwatchConfig::parse("").unwrap();
        assert_eq!(config, MeshwatchConfig::default());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.limits.max_messages, 50);
        assert_eq!(config.limits.max_subscribers, 100);
        assert_eq!(config.listener.args, ["-u", "meshtastic_listener.py"]);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = r"
server:
  port: 8080
listener:
  enabled: false
node_aliases:
  '0x9e7595c4': Node Charlie
";
        let config = MeshwatchConfig::parse(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(!config.listener.enabled);
        assert_eq!(config.listener.flush_idle_ms, 750);
        assert_eq!(
            config.node_aliases.display_name(&NodeId::from("0x9e7595c4")),
            "Node Charlie"
        );
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(matches!(
            MeshwatchConfig::parse("server: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn overrides_apply() {
        let mut config = MeshwatchConfig::default();
        let env: BTreeMap<&str, &str> = [
            ("PORT", "4000"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("LISTENER_COMMAND", "python3 -u other.py --port /dev/ttyACM0"),
        ]
        .into_iter()
        .collect();
        config
            .apply_overrides(|name| env.get(name).map(|v| (*v).to_owned()))
            .unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(
            config.server.allowed_origins,
            ["https://a.example", "https://b.example"]
        );
        assert_eq!(config.listener.program, "python3");
        assert_eq!(config.listener.args, ["-u", "other.py", "--port", "/dev/ttyACM0"]);
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let mut config = MeshwatchConfig::default();
        let result = config.apply_overrides(|name| (name == "PORT").then(|| String::from("http")));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidOverride { name: "PORT", .. })
        ));
    }

    #[test]
    fn unaliased_node_shows_its_id() {
        let aliases = NodeAliases::from_pairs([("0x1", "One")]);
        assert_eq!(aliases.display_name(&NodeId::from("0x2")), "0x2");
        assert_eq!(aliases.display_optional(None), "unknown");
    }
}

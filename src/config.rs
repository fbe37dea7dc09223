//! Configuration system for the raspi-off daemon
//!
//! Configuration comes from three layers, lowest precedence first: built-in defaults,
//! an optional TOML file, and command-line flags (which may themselves be fed by
//! environment variables through clap).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_SERVER: &str = "tcp://mqtt.local:1883";
pub const DEFAULT_BASE_TOPIC: &str = "raspi-off";
pub const DEFAULT_QOS: u8 = 1;
pub const DEFAULT_SHUTDOWN_COMMAND: &str = "shutdown";

/// Main daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DaemonConfig {
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub daemon: DaemonSection,
}

/// MQTT section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Full URL of the broker, e.g. `tcp://mqtt.local:1883`
    #[serde(default = "default_server")]
    pub server: String,
    /// Topic namespace under which `reboot` and `shutdown` are subscribed
    #[serde(default = "default_base_topic")]
    pub base_topic: String,
    /// Subscription quality-of-service level (0, 1 or 2)
    #[serde(default = "default_qos")]
    pub qos: u8,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Ceiling for the reconnection backoff. Unset means effectively unbounded.
    pub max_reconnect_interval_secs: Option<u64>,
}

fn default_server() -> String {
    DEFAULT_SERVER.to_string()
}

fn default_base_topic() -> String {
    DEFAULT_BASE_TOPIC.to_string()
}

fn default_qos() -> u8 {
    DEFAULT_QOS
}

fn default_keep_alive() -> u64 {
    2
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            server: default_server(),
            base_topic: default_base_topic(),
            qos: default_qos(),
            username_env: None,
            password_env: None,
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
            max_reconnect_interval_secs: None,
        }
    }
}

impl MqttSection {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validated QoS level
    pub fn qos_level(&self) -> Result<QosLevel, ConfigError> {
        QosLevel::try_from(self.qos)
    }
}

/// Daemon behaviour section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonSection {
    /// Exit instead of reconnecting when the broker rejects a subscription
    #[serde(default)]
    pub fail_fast: bool,
    /// Host executable invoked for reboot and power-off
    #[serde(default = "default_shutdown_command")]
    pub shutdown_command: String,
}

fn default_shutdown_command() -> String {
    DEFAULT_SHUTDOWN_COMMAND.to_string()
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            fail_fast: false,
            shutdown_command: default_shutdown_command(),
        }
    }
}

/// MQTT delivery-quality level, validated to the range the protocol defines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QosLevel {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl TryFrom<u8> for QosLevel {
    type Error = ConfigError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(QosLevel::AtMostOnce),
            1 => Ok(QosLevel::AtLeastOnce),
            2 => Ok(QosLevel::ExactlyOnce),
            other => Err(ConfigError::InvalidQos(other)),
        }
    }
}

impl From<QosLevel> for rumqttc::QoS {
    fn from(level: QosLevel) -> Self {
        match level {
            QosLevel::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QosLevel::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QosLevel::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// Values supplied on the command line. `None` leaves the file/default value alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub server: Option<String>,
    pub base_topic: Option<String>,
    pub qos: Option<u8>,
    pub fail_fast: bool,
    pub shutdown_command: Option<String>,
    pub max_reconnect_interval_secs: Option<u64>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid QoS level {0}: must be 0, 1 or 2")]
    InvalidQos(u8),
    #[error("Invalid server URL: {0}")]
    InvalidServerUrl(String),
    #[error("Invalid base topic: {0}")]
    InvalidBaseTopic(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DaemonConfig {
    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of this configuration
    pub fn with_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(server) = overrides.server {
            self.mqtt.server = server;
        }
        if let Some(base_topic) = overrides.base_topic {
            self.mqtt.base_topic = base_topic;
        }
        if let Some(qos) = overrides.qos {
            self.mqtt.qos = qos;
        }
        if overrides.fail_fast {
            self.daemon.fail_fast = true;
        }
        if let Some(command) = overrides.shutdown_command {
            self.daemon.shutdown_command = command;
        }
        if let Some(secs) = overrides.max_reconnect_interval_secs {
            self.mqtt.max_reconnect_interval_secs = Some(secs);
        }
        self
    }

    /// Check every field the daemon depends on at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mqtt.qos_level()?;
        validate_server_url(&self.mqtt.server)?;
        validate_base_topic(&self.mqtt.base_topic)?;

        if self.mqtt.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.mqtt.max_reconnect_interval_secs == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "max_reconnect_interval_secs (--max-reconnect-interval) must be greater than 0"
                    .to_string(),
            ));
        }
        if self.daemon.shutdown_command.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "shutdown_command cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Get MQTT username from environment variable
    pub fn get_mqtt_username(&self) -> Option<String> {
        get_env_var_optional(self.mqtt.username_env.as_deref())
    }

    /// Get MQTT password from environment variable
    pub fn get_mqtt_password(&self) -> Option<String> {
        get_env_var_optional(self.mqtt.password_env.as_deref())
    }
}

fn get_env_var_optional(env_var_name: Option<&str>) -> Option<String> {
    env_var_name.and_then(|name| std::env::var(name).ok())
}

fn validate_server_url(server: &str) -> Result<(), ConfigError> {
    let url = Url::parse(server).map_err(|_| ConfigError::InvalidServerUrl(server.to_string()))?;
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidServerUrl(server.to_string()));
    }
    match url.scheme() {
        "tcp" | "mqtt" | "ssl" | "tls" | "mqtts" => Ok(()),
        other => Err(ConfigError::InvalidServerUrl(format!(
            "{server} (unsupported scheme '{other}')"
        ))),
    }
}

fn validate_base_topic(topic: &str) -> Result<(), ConfigError> {
    if topic.is_empty() {
        return Err(ConfigError::InvalidBaseTopic("cannot be empty".to_string()));
    }
    if topic.contains(['+', '#']) {
        return Err(ConfigError::InvalidBaseTopic(format!(
            "'{topic}' must not contain wildcards"
        )));
    }
    Ok(())
}

//! Pure connection state management for the MQTT supervisor
//!
//! This module contains pure functions for connection state management,
//! configuration handling, and topic construction.

use crate::config::MqttSection;
use crate::dispatch::HostAction;
use rumqttc::{MqttOptions, Transport as RumqttcTransport};
use thiserror::Error;
use url::Url;

/// Connection state for the MQTT supervisor
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Initial state - attempting to connect
    Connecting,
    /// Connected and subscriptions requested
    Connected,
    /// Disconnected with reason
    Disconnected(String),
    /// Attempting to reconnect (attempt count)
    Reconnecting(u32),
    /// Shutdown completed
    Stopped,
}

/// Reconnection configuration
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before retrying when no connection has ever been established
    pub connect_retry_delay_ms: u64,
    /// First backoff delay after losing an established connection
    pub initial_backoff_ms: u64,
    /// Backoff ceiling; doubling stops here
    pub max_backoff_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            connect_retry_delay_ms: 30_000,
            initial_backoff_ms: 1_000,
            max_backoff_ms: u64::MAX,
        }
    }
}

impl ReconnectConfig {
    /// Build from the MQTT section. An unset ceiling stays effectively unbounded.
    pub fn from_section(config: &MqttSection) -> Self {
        let mut reconnect = Self::default();
        if let Some(secs) = config.max_reconnect_interval_secs {
            reconnect.max_backoff_ms = secs.saturating_mul(1000);
        }
        reconnect
    }

    /// Delay before reconnection attempt `attempt` (1-based)
    ///
    /// Before the first successful connection the fixed connect-retry delay applies.
    /// Afterwards the delay doubles from `initial_backoff_ms` up to `max_backoff_ms`.
    pub fn calculate_backoff_delay(&self, attempt: u32, ever_connected: bool) -> u64 {
        if !ever_connected {
            return self.connect_retry_delay_ms.min(self.max_backoff_ms);
        }
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        self.initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Subscription to '{topic}' failed")]
    SubscriptionFailed {
        topic: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Broker rejected subscription: {0}")]
    SubscriptionRejected(String),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Pure function to configure MQTT options from config
pub fn configure_mqtt_options(
    client_id: &str,
    config: &MqttSection,
    credentials: Option<(String, String)>,
) -> Result<MqttOptions, MqttError> {
    let (host, port, tls) = parse_broker_url(&config.server)?;

    let mut mqtt_options = MqttOptions::new(client_id, host, port);

    if tls {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some((username, password)) = credentials {
        mqtt_options.set_credentials(username, password);
    }

    // No queued-message replay across reconnects
    mqtt_options.set_clean_session(true);
    mqtt_options.set_keep_alive(config.keep_alive());

    Ok(mqtt_options)
}

/// Split a broker URL into host, port and whether TLS is required
pub fn parse_broker_url(server: &str) -> Result<(String, u16, bool), MqttError> {
    let url = Url::parse(server).map_err(|_| MqttError::InvalidBrokerUrl(server.to_string()))?;

    let tls = match url.scheme() {
        "tcp" | "mqtt" => false,
        "ssl" | "tls" | "mqtts" => true,
        _ => return Err(MqttError::InvalidBrokerUrl(server.to_string())),
    };

    let host = url
        .host_str()
        .ok_or_else(|| MqttError::InvalidBrokerUrl(server.to_string()))?
        .to_string();
    let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

    Ok((host, port, tls))
}

/// Topic construction relative to the base topic
pub struct TopicBuilder;

impl TopicBuilder {
    /// `{base}/{action}`
    pub fn build_action_topic(base_topic: &str, action: HostAction) -> String {
        format!("{}/{}", base_topic.trim_end_matches('/'), action.topic_suffix())
    }

    /// Both subscriptions, reboot first
    pub fn build_subscription_topics(base_topic: &str) -> Vec<String> {
        [HostAction::Reboot, HostAction::Shutdown]
            .into_iter()
            .map(|action| Self::build_action_topic(base_topic, action))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_reconnect_config_default() {
        let config = ReconnectConfig::default();
        assert_eq!(config.connect_retry_delay_ms, 30_000);
        assert_eq!(config.initial_backoff_ms, 1_000);
        assert_eq!(config.max_backoff_ms, u64::MAX);
    }

    #[test]
    fn test_backoff_doubles_after_first_connection() {
        let config = ReconnectConfig::default();
        assert_eq!(config.calculate_backoff_delay(1, true), 1_000);
        assert_eq!(config.calculate_backoff_delay(2, true), 2_000);
        assert_eq!(config.calculate_backoff_delay(3, true), 4_000);
        assert_eq!(config.calculate_backoff_delay(11, true), 1_024_000);
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let config = ReconnectConfig::default();
        assert_eq!(config.calculate_backoff_delay(64, true), u64::MAX);
        assert_eq!(config.calculate_backoff_delay(u32::MAX, true), u64::MAX);
    }

    #[test]
    fn test_backoff_respects_ceiling() {
        let config = ReconnectConfig {
            max_backoff_ms: 5_000,
            ..Default::default()
        };
        assert_eq!(config.calculate_backoff_delay(3, true), 4_000);
        assert_eq!(config.calculate_backoff_delay(4, true), 5_000);
        assert_eq!(config.calculate_backoff_delay(40, true), 5_000);
        assert_eq!(config.calculate_backoff_delay(1, false), 5_000);
    }

    #[test]
    fn test_initial_connect_uses_fixed_retry_delay() {
        let config = ReconnectConfig::default();
        assert_eq!(config.calculate_backoff_delay(1, false), 30_000);
        assert_eq!(config.calculate_backoff_delay(9, false), 30_000);
    }

    #[test]
    fn test_from_section() {
        let mut section = MqttSection::default();
        assert_eq!(ReconnectConfig::from_section(&section).max_backoff_ms, u64::MAX);
        section.max_reconnect_interval_secs = Some(120);
        assert_eq!(ReconnectConfig::from_section(&section).max_backoff_ms, 120_000);
    }

    #[test]
    fn test_topic_construction() {
        assert_eq!(
            TopicBuilder::build_action_topic("raspi-off", HostAction::Reboot),
            "raspi-off/reboot"
        );
        assert_eq!(
            TopicBuilder::build_subscription_topics("home/raspi-off"),
            vec!["home/raspi-off/reboot", "home/raspi-off/shutdown"]
        );
        assert_eq!(
            TopicBuilder::build_action_topic("home/", HostAction::Shutdown),
            "home/shutdown"
        );
    }

    #[test]
    fn test_parse_broker_url() {
        assert_eq!(
            parse_broker_url("tcp://mqtt.local:1883").unwrap(),
            ("mqtt.local".to_string(), 1883, false)
        );
        assert_eq!(
            parse_broker_url("mqtt://broker").unwrap(),
            ("broker".to_string(), 1883, false)
        );
        assert_eq!(
            parse_broker_url("ssl://broker").unwrap(),
            ("broker".to_string(), 8883, true)
        );
        assert_eq!(
            parse_broker_url("mqtts://broker:9999").unwrap(),
            ("broker".to_string(), 9999, true)
        );
        assert!(matches!(
            parse_broker_url("invalid-url"),
            Err(MqttError::InvalidBrokerUrl(_))
        ));
        assert!(matches!(
            parse_broker_url("ws://broker:80"),
            Err(MqttError::InvalidBrokerUrl(_))
        ));
    }

    #[test]
    fn test_configure_mqtt_options() {
        let config = MqttSection::default();
        let options = configure_mqtt_options("raspi-off-aabbccddeeff", &config, None).unwrap();
        assert_eq!(options.client_id(), "raspi-off-aabbccddeeff");
        assert_eq!(options.broker_address(), ("mqtt.local".to_string(), 1883));
        assert!(options.clean_session());
        assert_eq!(options.keep_alive(), Duration::from_secs(2));
    }

    #[test]
    fn test_configure_mqtt_options_with_credentials() {
        let config = MqttSection::default();
        let options = configure_mqtt_options(
            "raspi-off-unknown",
            &config,
            Some(("user".to_string(), "pass".to_string())),
        )
        .unwrap();
        assert_eq!(
            options.credentials(),
            Some(("user".to_string(), "pass".to_string()))
        );
    }

    #[test]
    fn test_connection_state_equality() {
        assert_eq!(ConnectionState::Connected, ConnectionState::Connected);
        assert_ne!(
            ConnectionState::Connected,
            ConnectionState::Disconnected("test".to_string())
        );
    }

    #[test]
    fn test_mqtt_error_display() {
        let errors = vec![
            MqttError::ConnectionFailed("test".to_string().into()),
            MqttError::SubscriptionFailed {
                topic: "raspi-off/reboot".to_string(),
                source: "test".to_string().into(),
            },
            MqttError::SubscriptionRejected("test".to_string()),
            MqttError::InvalidBrokerUrl("test".to_string()),
            MqttError::InvalidConfig("test".to_string()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}

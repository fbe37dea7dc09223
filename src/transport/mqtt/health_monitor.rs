//! Pure health monitoring and reconnection logic for the MQTT supervisor
//!
//! This module contains pure functions for reconnection decision making
//! and connection state tracking.

use super::connection::{ConnectionState, ReconnectConfig};
use tracing::{info, warn};

/// Pure health monitoring and reconnection decision logic
pub struct HealthMonitor;

impl HealthMonitor {
    /// Determine if reconnection should be attempted (pure function)
    /// Retries are unbounded; only shutdown stops them
    pub fn should_attempt_reconnection(
        current_attempts: u32,
        config: &ReconnectConfig,
        shutdown_requested: bool,
        ever_connected: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }

        let attempt = current_attempts.saturating_add(1);
        ReconnectionDecision::Proceed {
            attempt,
            delay_ms: config.calculate_backoff_delay(attempt, ever_connected),
        }
    }

    /// Determine next state after connection event (pure function)
    pub fn determine_next_state(event: ConnectionEvent) -> ConnectionState {
        match event {
            ConnectionEvent::ConnAckReceived => ConnectionState::Connected,
            ConnectionEvent::DisconnectedByBroker => {
                ConnectionState::Disconnected("Broker disconnected".to_string())
            }
            ConnectionEvent::NetworkError(error) => ConnectionState::Disconnected(error),
            ConnectionEvent::SubscriptionFailed(reason) => {
                ConnectionState::Disconnected(format!("Subscription failed: {reason}"))
            }
            ConnectionEvent::ReconnectionStarted(attempt) => ConnectionState::Reconnecting(attempt),
            ConnectionEvent::ShutdownCompleted => ConnectionState::Stopped,
        }
    }

    /// Log connection state transition (pure logging function)
    pub fn log_state_transition(from: &ConnectionState, to: &ConnectionState) {
        match (from, to) {
            (ConnectionState::Connecting, ConnectionState::Connected) => {
                info!("Connected");
            }
            (ConnectionState::Reconnecting(attempt), ConnectionState::Connected) => {
                info!("Reconnected after {} attempt(s)", attempt);
            }
            (ConnectionState::Connected, ConnectionState::Disconnected(reason)) => {
                warn!("MQTT connection lost: {}", reason);
            }
            (_, ConnectionState::Disconnected(reason)) => {
                warn!("MQTT connection attempt failed: {}", reason);
            }
            (_, ConnectionState::Reconnecting(attempt)) => {
                info!("Starting reconnection attempt {}", attempt);
            }
            (_, ConnectionState::Stopped) => {
                info!("MQTT supervisor stopped");
            }
            _ => {
                info!("MQTT connection state: {:?} -> {:?}", from, to);
            }
        }
    }

    /// Validate reconnection configuration (pure function)
    pub fn validate_reconnect_config(config: &ReconnectConfig) -> Result<(), String> {
        if config.initial_backoff_ms == 0 {
            return Err("initial_backoff_ms must be greater than 0".to_string());
        }
        if config.max_backoff_ms == 0 {
            return Err("max_backoff_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, PartialEq)]
pub enum ReconnectionDecision {
    /// Proceed with reconnection attempt
    Proceed { attempt: u32, delay_ms: u64 },
    /// Abort reconnection - shutdown requested
    AbortShutdownRequested,
}

/// Connection events that trigger state transitions
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// ConnAck received from broker
    ConnAckReceived,
    /// Broker initiated disconnect
    DisconnectedByBroker,
    /// Network or protocol error
    NetworkError(String),
    /// Subscribe request failed or SubAck carried a failure code
    SubscriptionFailed(String),
    /// Reconnection attempt started
    ReconnectionStarted(u32),
    /// Shutdown sequence finished
    ShutdownCompleted,
}

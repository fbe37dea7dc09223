//! Top-level error type for the raspi-off daemon
//!
//! Each module owns its error enum; this aggregate is what `main` sees. Identity and
//! command errors never reach it: they degrade or are swallowed where they occur.

use crate::config::ConfigError;
use crate::transport::mqtt::MqttError;
use thiserror::Error;

/// Main error type for daemon operations
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("MQTT error: {0}")]
    Mqtt(#[from] MqttError),

    #[error("Signal handling error: {0}")]
    Signal(#[source] std::io::Error),

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl DaemonError {
    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Result type for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

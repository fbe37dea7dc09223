//! MQTT connection supervision for the raspi-off daemon
//!
//! This module separates pure decision logic from the I/O loop for testability.
//!
//! # Architecture
//!
//! - [`connection`] - Pure connection state, options and topic construction
//! - [`message_handler`] - Pure routing of rumqttc events
//! - [`health_monitor`] - Pure state transitions and reconnection decisions
//! - [`supervisor`] - Impure event loop, (re)subscription and shutdown
//!
//! # Usage
//!
//! ```rust,no_run
//! use raspi_off::config::DaemonConfig;
//! use raspi_off::dispatch::{ActionDispatcher, SystemCommandRunner};
//! use raspi_off::transport::mqtt::ConnectionSupervisor;
//! use tokio::sync::watch;
//!
//! # tokio_test::block_on(async {
//! let config = DaemonConfig::default();
//! let (dispatcher, worker) = ActionDispatcher::new(SystemCommandRunner::default()).spawn();
//! let supervisor = ConnectionSupervisor::new("raspi-off-aabbccddeeff", &config, dispatcher)?;
//!
//! let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//! supervisor.run(shutdown_rx).await?;
//! worker.await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod connection;
pub mod health_monitor;
pub mod message_handler;
pub mod supervisor;

// Re-export public types for convenience
pub use connection::{ConnectionState, MqttError, ReconnectConfig, TopicBuilder};
pub use health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
pub use message_handler::{EventRoute, MessageHandler};
pub use supervisor::{ConnectionSupervisor, RouteOutcome};

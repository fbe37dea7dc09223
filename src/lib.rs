//! raspi-off - remote shutdown and reboot over MQTT
//!
//! A small daemon for Raspberry Pi style hosts. It connects to an MQTT broker,
//! subscribes to `<base>/reboot` and `<base>/shutdown`, and runs the host's
//! `shutdown` command when a message arrives. The payload is the delay argument
//! (`now` when empty).
//!
//! # Overview
//!
//! - [`identity`] - Stable client identifier from the host's hardware address
//! - [`dispatch`] - Topic-to-action mapping and host command execution
//! - [`transport`] - Connection supervision with unbounded reconnection
//! - [`config`] - Defaults, TOML file and command-line layering
//!
//! # Quick Start
//!
//! ```rust
//! use raspi_off::dispatch::{HostAction, HostCommand};
//!
//! let command = HostCommand::from_message("home/raspi-off/shutdown", b"+10").unwrap();
//! assert_eq!(command.action, HostAction::Shutdown);
//! assert_eq!(command.args(), ["-h", "+10"]);
//!
//! let command = HostCommand::from_message("home/raspi-off/reboot", b"").unwrap();
//! assert_eq!(command.args(), ["-r", "now"]);
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod observability;
pub mod testing;
pub mod transport;

pub use config::{DaemonConfig, QosLevel};
pub use dispatch::{ActionDispatcher, HostAction, HostCommand, SystemCommandRunner};
pub use error::{DaemonError, DaemonResult};
pub use identity::resolve_identity;
pub use transport::mqtt::ConnectionSupervisor;

//! Topic-to-action dispatch
//!
//! Maps inbound messages on `<base>/reboot` and `<base>/shutdown` to host power
//! commands and runs them.
//!
//! - [`action`] - Pure topic and payload interpretation
//! - [`command`] - Host command execution
//! - [`dispatcher`] - Sequential worker fed by the connection supervisor

pub mod action;
pub mod command;
pub mod dispatcher;

pub use action::{HostAction, HostCommand, DEFAULT_DELAY};
pub use command::{CommandError, HostCommandRunner, SystemCommandRunner};
pub use dispatcher::{ActionDispatcher, DispatcherHandle, InboundMessage};

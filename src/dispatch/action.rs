//! Pure interpretation of inbound messages
//!
//! No I/O happens here: a topic and payload go in, an optional host command comes out.

use std::fmt;

pub const REBOOT: &str = "reboot";
pub const SHUTDOWN: &str = "shutdown";

/// Delay token used when the payload is empty
pub const DEFAULT_DELAY: &str = "now";

/// Host power action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Reboot,
    Shutdown,
}

impl HostAction {
    /// Leaf topic name under the base topic
    pub fn topic_suffix(self) -> &'static str {
        match self {
            HostAction::Reboot => REBOOT,
            HostAction::Shutdown => SHUTDOWN,
        }
    }

    /// `shutdown` flag selecting the action
    pub fn shutdown_flag(self) -> &'static str {
        match self {
            HostAction::Reboot => "-r",
            HostAction::Shutdown => "-h",
        }
    }

    /// Select the action from a topic suffix. Reboot is checked first.
    pub fn from_topic(topic: &str) -> Option<Self> {
        if topic.ends_with(REBOOT) {
            Some(HostAction::Reboot)
        } else if topic.ends_with(SHUTDOWN) {
            Some(HostAction::Shutdown)
        } else {
            None
        }
    }
}

impl fmt::Display for HostAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic_suffix())
    }
}

/// An action together with its delay argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    pub action: HostAction,
    pub delay: String,
}

impl HostCommand {
    /// Interpret a message. Returns `None` for topics that match neither action.
    pub fn from_message(topic: &str, payload: &[u8]) -> Option<Self> {
        let action = HostAction::from_topic(topic)?;
        Some(Self {
            action,
            delay: parse_delay(payload),
        })
    }

    /// Arguments passed to the shutdown executable
    pub fn args(&self) -> [&str; 2] {
        [self.action.shutdown_flag(), self.delay.as_str()]
    }
}

/// Payload as delay argument, `now` when empty
pub fn parse_delay(payload: &[u8]) -> String {
    if payload.is_empty() {
        DEFAULT_DELAY.to_string()
    } else {
        String::from_utf8_lossy(payload).into_owned()
    }
}

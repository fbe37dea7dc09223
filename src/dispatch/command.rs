//! Host command execution

use super::action::HostCommand;
use async_trait::async_trait;
use std::process::ExitStatus;
use thiserror::Error;
use tokio::process::Command;

/// Host command failures
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{command}' exited with {status}")]
    ExitStatus { command: String, status: ExitStatus },
}

/// Runs host power commands
#[async_trait]
pub trait HostCommandRunner: Send + Sync {
    /// Run the command and wait for it to exit
    async fn run(&self, command: &HostCommand) -> Result<(), CommandError>;

    /// Human-readable command line, logged before execution
    fn command_line(&self, command: &HostCommand) -> String;
}

/// Runs the system `shutdown` executable
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    program: String,
}

impl SystemCommandRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SHUTDOWN_COMMAND)
    }
}

#[async_trait]
impl HostCommandRunner for SystemCommandRunner {
    async fn run(&self, command: &HostCommand) -> Result<(), CommandError> {
        let status = Command::new(&self.program)
            .args(command.args())
            .kill_on_drop(false)
            .status()
            .await
            .map_err(|source| CommandError::Spawn {
                command: self.command_line(command),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(CommandError::ExitStatus {
                command: self.command_line(command),
                status,
            })
        }
    }

    fn command_line(&self, command: &HostCommand) -> String {
        let [flag, delay] = command.args();
        format!("{} {} {}", self.program, flag, delay)
    }
}

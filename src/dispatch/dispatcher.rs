//! Message dispatch worker
//!
//! The connection supervisor forwards every delivered publish over a bounded channel.
//! A single worker interprets and executes them in arrival order, so a slow host
//! command never stalls the MQTT event loop.

use super::action::HostCommand;
use super::command::HostCommandRunner;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Channel capacity between the supervisor and the worker
pub const DISPATCH_QUEUE_CAPACITY: usize = 32;

/// A publish delivered by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Maps inbound messages to host commands and runs them
pub struct ActionDispatcher<R> {
    runner: Arc<R>,
}

impl<R> Clone for ActionDispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            runner: self.runner.clone(),
        }
    }
}

impl<R: HostCommandRunner + 'static> ActionDispatcher<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner: Arc::new(runner),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Handle one message. Returns the command that was attempted, if any.
    ///
    /// Execution failures are logged and swallowed.
    pub async fn on_message(&self, topic: &str, payload: &[u8]) -> Option<HostCommand> {
        let Some(command) = HostCommand::from_message(topic, payload) else {
            debug!(topic = %topic, "No action bound to topic, ignoring message");
            return None;
        };

        info!(action = %command.action, delay = %command.delay, "Executing host action");
        info!(
            command = %self.runner.command_line(&command),
            "{} command", command.action
        );

        if let Err(e) = self.runner.run(&command).await {
            error!(action = %command.action, "Error: {}", e);
        }
        Some(command)
    }

    /// Spawn the worker task. Dropping every [`DispatcherHandle`] stops it once the
    /// queue is drained.
    pub fn spawn(self) -> (DispatcherHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<InboundMessage>(DISPATCH_QUEUE_CAPACITY);

        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let span = crate::dispatch_span!(topic = %message.topic);
                self.on_message(&message.topic, &message.payload)
                    .instrument(span)
                    .await;
            }
            debug!("Dispatch queue closed, worker stopping");
        });

        (DispatcherHandle { sender: tx }, handle)
    }
}

/// Sending side of the dispatch queue
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<InboundMessage>,
}

impl DispatcherHandle {
    /// Queue a message for the worker. Returns false if the worker is gone.
    pub async fn dispatch(&self, message: InboundMessage) -> bool {
        match self.sender.send(message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(topic = %e.0.topic, "Dispatcher stopped, dropping message");
                false
            }
        }
    }
}

//! Mock implementations for testing
//!
//! Provides mock command runner, subscriber, interface and random sources so the
//! dispatch, identity and supervision logic can be exercised without side effects.

use crate::dispatch::{CommandError, HostCommand, HostCommandRunner};
use crate::identity::{IdentityError, InterfaceSource, NetworkInterface, RandomSource};
use crate::transport::mqtt::MqttError;
use crate::transport::TopicSubscriber;
use async_trait::async_trait;
use rumqttc::QoS;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Records host commands instead of running them
#[derive(Debug, Clone, Default)]
pub struct MockCommandRunner {
    pub executed: Arc<Mutex<Vec<HostCommand>>>,
    /// Zero-based call indices that fail
    pub failing_calls: Arc<HashSet<usize>>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the listed calls fail
    pub fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            failing_calls: Arc::new(calls.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Every command attempted, including failed ones
    pub async fn executed(&self) -> Vec<HostCommand> {
        self.executed.lock().await.clone()
    }
}

#[async_trait]
impl HostCommandRunner for MockCommandRunner {
    async fn run(&self, command: &HostCommand) -> Result<(), CommandError> {
        let mut executed = self.executed.lock().await;
        let call = executed.len();
        executed.push(command.clone());

        if self.failing_calls.contains(&call) {
            return Err(CommandError::Spawn {
                command: self.command_line(command),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "command not found"),
            });
        }
        Ok(())
    }

    fn command_line(&self, command: &HostCommand) -> String {
        let [flag, delay] = command.args();
        format!("mock-shutdown {flag} {delay}")
    }
}

/// Records subscribe/unsubscribe requests
#[derive(Debug, Clone, Default)]
pub struct MockSubscriber {
    pub subscriptions: Arc<Mutex<Vec<(String, QoS)>>>,
    pub unsubscriptions: Arc<Mutex<Vec<String>>>,
    pub disconnects: Arc<Mutex<u32>>,
    pub should_fail: bool,
}

impl MockSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub async fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.subscriptions.lock().await.clone()
    }

    pub async fn unsubscriptions(&self) -> Vec<String> {
        self.unsubscriptions.lock().await.clone()
    }

    pub async fn disconnects(&self) -> u32 {
        *self.disconnects.lock().await
    }

    pub async fn clear_history(&self) {
        self.subscriptions.lock().await.clear();
        self.unsubscriptions.lock().await.clear();
        *self.disconnects.lock().await = 0;
    }
}

#[async_trait]
impl TopicSubscriber for MockSubscriber {
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), MqttError> {
        if self.should_fail {
            return Err(MqttError::SubscriptionFailed {
                topic: topic.to_string(),
                source: "Mock subscribe failure".into(),
            });
        }
        self.subscriptions
            .lock()
            .await
            .push((topic.to_string(), qos));
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), MqttError> {
        self.unsubscriptions.lock().await.push(topic.to_string());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), MqttError> {
        *self.disconnects.lock().await += 1;
        Ok(())
    }
}

/// Fixed list of interfaces
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces {
    pub interfaces: Vec<NetworkInterface>,
    pub should_fail: bool,
}

impl StaticInterfaces {
    pub fn new(interfaces: Vec<NetworkInterface>) -> Self {
        Self {
            interfaces,
            should_fail: false,
        }
    }

    /// Enumeration itself fails
    pub fn failing() -> Self {
        Self {
            interfaces: Vec::new(),
            should_fail: true,
        }
    }

    /// Convenience constructor for a single interface
    pub fn interface(name: &str, index: u32, is_up: bool, mac: &[u8]) -> NetworkInterface {
        NetworkInterface {
            name: name.to_string(),
            index,
            is_up,
            hardware_addr: mac.to_vec(),
        }
    }
}

impl InterfaceSource for StaticInterfaces {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>, IdentityError> {
        if self.should_fail {
            return Err(IdentityError::InterfaceEnumeration(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "Mock enumeration failure",
            )));
        }
        Ok(self.interfaces.clone())
    }
}

/// Deterministic random source; `None` fails every call
#[derive(Debug, Clone)]
pub struct FixedRandom {
    pub bytes: Option<Vec<u8>>,
}

impl FixedRandom {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: Some(bytes.to_vec()),
        }
    }

    pub fn failing() -> Self {
        Self { bytes: None }
    }
}

impl RandomSource for FixedRandom {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), IdentityError> {
        let bytes = self
            .bytes
            .as_ref()
            .ok_or_else(|| IdentityError::RandomSource("Mock random failure".to_string()))?;
        for (dst, src) in buf.iter_mut().zip(bytes.iter().cycle()) {
            *dst = *src;
        }
        Ok(())
    }
}

//! Transport layer for the broker connection
//!
//! This module provides the subscription seam the connection supervisor talks to,
//! and the MQTT implementation built on rumqttc.

use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};

pub mod mqtt;

use mqtt::MqttError;

/// Subscription operations the supervisor issues against a live connection
///
/// Abstracted so the (re)subscription policy can be exercised without a broker.
#[async_trait]
pub trait TopicSubscriber: Send + Sync {
    /// Request a subscription. Success means the request was queued; the broker's
    /// verdict arrives later as a SubAck.
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), MqttError>;

    /// Request removal of a subscription
    async fn unsubscribe(&self, topic: &str) -> Result<(), MqttError>;

    /// Request a clean disconnect
    async fn disconnect(&self) -> Result<(), MqttError>;
}

#[async_trait]
impl TopicSubscriber for AsyncClient {
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), MqttError> {
        AsyncClient::subscribe(self, topic, qos)
            .await
            .map_err(|e| MqttError::SubscriptionFailed {
                topic: topic.to_string(),
                source: Box::new(e),
            })
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), MqttError> {
        AsyncClient::unsubscribe(self, topic)
            .await
            .map_err(|e| MqttError::ConnectionFailed(Box::new(e)))
    }

    async fn disconnect(&self) -> Result<(), MqttError> {
        AsyncClient::disconnect(self)
            .await
            .map_err(|e| MqttError::ConnectionFailed(Box::new(e)))
    }
}

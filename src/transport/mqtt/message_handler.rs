//! Pure message routing for MQTT events
//!
//! This module contains pure functions for classifying rumqttc events
//! and validating subscription acknowledgements.

use rumqttc::{Event, Outgoing, Packet, SubscribeReasonCode};
use tracing::debug;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                    retain: publish.retain,
                },
                Packet::Disconnect => EventRoute::Disconnected,
                Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                    packet_id: suback.pkid,
                    return_codes: suback.return_codes.clone(),
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(Outgoing::Disconnect) => EventRoute::DisconnectSent,
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// Validate subscription success from SubAck (pure function)
    pub fn validate_subscription_success(
        return_codes: &[SubscribeReasonCode],
    ) -> Result<(), String> {
        if return_codes
            .iter()
            .any(|code| matches!(code, SubscribeReasonCode::Failure))
        {
            Err(format!(
                "Subscription failed with return codes: {return_codes:?}"
            ))
        } else {
            debug!("Subscription confirmed: {:?}", return_codes);
            Ok(())
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Connection acknowledged - ready to subscribe
    ConnectionAcknowledged,
    /// Message received on subscribed topic
    MessageReceived {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    /// MQTT broker disconnected
    Disconnected,
    /// Our own Disconnect packet went out
    DisconnectSent,
    /// Subscription confirmed with return codes
    SubscriptionConfirmed {
        packet_id: u16,
        return_codes: Vec<SubscribeReasonCode>,
    },
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}

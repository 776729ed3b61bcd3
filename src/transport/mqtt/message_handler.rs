//! Pure message routing and payload decoding
//!
//! Routing decisions for rumqttc events and the read-side decode policy,
//! kept free of I/O so both can be tested in isolation.
//!
//! Decode precedence for `decode_as_string` reads:
//! 1. a JSON object carrying both `topic` and `payload` fields is treated as
//!    an envelope and overrides the transport-level topic, provided the
//!    caller's filter (if any) matches the envelope topic;
//! 2. any other non-empty JSON document is returned parsed, under the
//!    transport topic;
//! 3. empty documents, scalars, and unparseable text degrade to the decoded
//!    text verbatim.

use crate::message::{Message, ReadMessage, ReadPayload};
use bytes::Bytes;
use rumqttc::v5::{mqttbytes::v5::Packet, Event};
use serde_json::Value;
use tracing::{debug, warn};

/// Routing decision for one transport event.
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Connect acknowledgment - connection is up
    ConnectionAcknowledged,
    /// Message received on a subscribed topic
    MessageReceived { topic: String, payload: Bytes },
    /// Broker closed the connection
    Disconnected,
    /// Subscription confirmed
    SubscriptionConfirmed { packet_id: u16 },
    /// Unsubscription confirmed
    UnsubscribeConfirmed { packet_id: u16 },
    /// Keep-alives, acks, and outgoing traffic
    Ignored,
}

/// Map a rumqttc event to a routing decision.
pub fn route_event(event: &Event) -> EventRoute {
    match event {
        Event::Incoming(packet) => match packet {
            Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
            Packet::Publish(publish) => EventRoute::MessageReceived {
                topic: String::from_utf8_lossy(&publish.topic).to_string(),
                payload: publish.payload.clone(),
            },
            Packet::Disconnect(_) => EventRoute::Disconnected,
            Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                packet_id: suback.pkid,
            },
            Packet::UnsubAck(unsuback) => EventRoute::UnsubscribeConfirmed {
                packet_id: unsuback.pkid,
            },
            _ => EventRoute::Ignored,
        },
        Event::Outgoing(_) => EventRoute::Ignored,
    }
}

/// Apply the read-side decode policy to one popped message.
pub fn decode_message(msg: Message, filter: Option<&str>, decode_as_string: bool) -> ReadMessage {
    if !decode_as_string {
        return ReadMessage {
            topic: msg.topic,
            payload: ReadPayload::Raw(msg.payload),
        };
    }

    let text = match std::str::from_utf8(&msg.payload) {
        Ok(text) => text.to_string(),
        Err(e) => {
            warn!(topic = %msg.topic, "failed to decode payload as UTF-8: {e}");
            String::new()
        }
    };

    if text.is_empty() {
        return ReadMessage {
            topic: msg.topic,
            payload: ReadPayload::Text(text),
        };
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(parsed) => structured_read(msg.topic, parsed, text, filter),
        Err(e) => {
            debug!("payload is not JSON, returning text verbatim: {e}");
            ReadMessage {
                topic: msg.topic,
                payload: ReadPayload::Text(text),
            }
        }
    }
}

/// Precedence among parsed documents: envelope match, then the parsed value,
/// then the decoded text.
fn structured_read(
    transport_topic: String,
    parsed: Value,
    text: String,
    filter: Option<&str>,
) -> ReadMessage {
    match &parsed {
        Value::Object(map) if !map.is_empty() => {
            let envelope = map
                .get("topic")
                .and_then(Value::as_str)
                .filter(|_| map.contains_key("payload"));
            if let Some(envelope_topic) = envelope {
                if filter.is_none() || filter == Some(envelope_topic) {
                    let envelope_payload = map
                        .get("payload")
                        .cloned()
                        .unwrap_or(Value::Null);
                    return ReadMessage {
                        topic: envelope_topic.to_string(),
                        payload: payload_from_value(envelope_payload),
                    };
                }
            }
            ReadMessage {
                topic: transport_topic,
                payload: ReadPayload::Structured(parsed),
            }
        }
        Value::Array(items) if !items.is_empty() => ReadMessage {
            topic: transport_topic,
            payload: ReadPayload::Structured(parsed),
        },
        Value::String(s) if !s.is_empty() => ReadMessage {
            topic: transport_topic,
            payload: ReadPayload::Text(s.clone()),
        },
        // Empty documents and bare scalars degrade to the decoded text
        // verbatim.
        _ => {
            debug!("parsed 0 elements in JSON payload");
            ReadMessage {
                topic: transport_topic,
                payload: ReadPayload::Text(text),
            }
        }
    }
}

fn payload_from_value(value: Value) -> ReadPayload {
    match value {
        Value::String(s) => ReadPayload::Text(s),
        other => ReadPayload::Structured(other),
    }
}

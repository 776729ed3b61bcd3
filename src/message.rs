//! Message types for the pub/sub client facade
//!
//! Defines the inbound [`Message`] as delivered by the transport, the tagged
//! write-side [`Payload`] variants, and the decoded read-side
//! [`ReadMessage`]/[`ReadPayload`] returned by `read`.

use bytes::Bytes;
use serde_json::Value;
use std::fmt;

/// An inbound message as delivered by the transport.
///
/// Immutable once buffered; ownership moves from the delivery loop into the
/// buffer on arrival and from the buffer to the caller on `read`.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Transport-level topic the message arrived on
    pub topic: String,
    /// Raw payload bytes as received
    pub payload: Bytes,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Outbound payload, dispatched explicitly instead of by runtime type
/// inspection.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Plain text, published literally
    Text(String),
    /// Structured document, serialized to JSON before publishing
    Structured(Value),
    /// Raw bytes, published unchanged
    Raw(Bytes),
}

impl Payload {
    /// Produce the wire bytes and the published length reported by `write`.
    ///
    /// Text and raw payloads count their own length; structured payloads
    /// count the serialized JSON text.
    pub fn encoded(&self) -> Result<(Bytes, usize), serde_json::Error> {
        match self {
            Payload::Text(text) => Ok((Bytes::from(text.clone().into_bytes()), text.len())),
            Payload::Structured(value) => {
                let serialized = serde_json::to_string(value)?;
                let len = serialized.len();
                Ok((Bytes::from(serialized.into_bytes()), len))
            }
            Payload::Raw(bytes) => Ok((bytes.clone(), bytes.len())),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Structured(value)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Raw(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Raw(Bytes::from(bytes))
    }
}

/// Decoded payload handed to the caller by `read`.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadPayload {
    /// Unmodified bytes (`decode_as_string = false`)
    Raw(Bytes),
    /// Decoded text, possibly empty on decode failure
    Text(String),
    /// Parsed JSON document
    Structured(Value),
}

impl ReadPayload {
    /// Render the payload as a JSON value, for display or re-serialization.
    /// Raw bytes are rendered lossily as UTF-8 text.
    pub fn to_value(&self) -> Value {
        match self {
            ReadPayload::Raw(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            ReadPayload::Text(text) => Value::String(text.clone()),
            ReadPayload::Structured(value) => value.clone(),
        }
    }

    /// The decoded text, if this payload is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ReadPayload::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for ReadPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadPayload::Raw(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            ReadPayload::Text(text) => write!(f, "{text}"),
            ReadPayload::Structured(value) => write!(f, "{value}"),
        }
    }
}

/// One popped message after the read-side decode policy has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadMessage {
    /// Logical topic: the envelope topic when an envelope matched, the
    /// transport topic otherwise
    pub topic: String,
    pub payload: ReadPayload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_payload_length_accounting() {
        let payload = Payload::Text("hello".to_string());
        let (bytes, len) = payload.encoded().unwrap();
        assert_eq!(&bytes[..], b"hello");
        assert_eq!(len, 5);
    }

    #[test]
    fn test_structured_payload_counts_serialized_length() {
        let payload = Payload::Structured(json!({"a": 1}));
        let (bytes, len) = payload.encoded().unwrap();
        let serialized = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(serialized, r#"{"a":1}"#);
        assert_eq!(len, serialized.len());
    }

    #[test]
    fn test_raw_payload_byte_length() {
        let payload = Payload::Raw(Bytes::from_static(&[0x00, 0xff, 0x7f]));
        let (bytes, len) = payload.encoded().unwrap();
        assert_eq!(len, 3);
        assert_eq!(bytes.len(), 3);
    }

    #[test]
    fn test_payload_conversions() {
        assert_eq!(Payload::from("hi"), Payload::Text("hi".to_string()));
        assert_eq!(
            Payload::from(json!({"k": "v"})),
            Payload::Structured(json!({"k": "v"}))
        );
        assert_eq!(
            Payload::from(vec![1u8, 2, 3]),
            Payload::Raw(Bytes::from_static(&[1, 2, 3]))
        );
    }

    #[test]
    fn test_read_payload_to_value() {
        assert_eq!(
            ReadPayload::Text("x".to_string()).to_value(),
            Value::String("x".to_string())
        );
        assert_eq!(
            ReadPayload::Structured(json!({"a": 1})).to_value(),
            json!({"a": 1})
        );
        assert_eq!(
            ReadPayload::Raw(Bytes::from_static(b"raw")).to_value(),
            Value::String("raw".to_string())
        );
    }

    #[test]
    fn test_read_payload_display() {
        assert_eq!(ReadPayload::Text("t".to_string()).to_string(), "t");
        assert_eq!(
            ReadPayload::Structured(json!({"a": 1})).to_string(),
            r#"{"a":1}"#
        );
    }
}

//! Wire envelope codec
//!
//! Every protocol message travels as a JSON object `{"t": <code>, "d": <payload>}`:
//!
//! | code | direction        | payload                                         |
//! |------|------------------|-------------------------------------------------|
//! | 0    | server -> client | `{"clientInterval": ms, "clientAttempts": n}`   |
//! | 1    | client -> server | `{"topic": ..}`                                 |
//! | 7    | both             | `{"topic": .., "event": .., "data": {..}}`      |
//! | 8    | client -> server | none                                            |
//! | 9    | server -> client | none                                            |
//!
//! Codes outside this table decode to [`Frame::Unknown`] so newer servers
//! do not break older clients.

use crate::traits::error::{AdonisError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name used for every outbound type-7 frame
pub const OUTBOUND_EVENT: &str = "message";

/// Known frame type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    HeartbeatConfig = 0,
    Join = 1,
    Event = 7,
    Ping = 8,
    Ack = 9,
}

impl FrameType {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(FrameType::HeartbeatConfig),
            1 => Some(FrameType::Join),
            7 => Some(FrameType::Event),
            8 => Some(FrameType::Ping),
            9 => Some(FrameType::Ack),
            _ => None,
        }
    }
}

/// Heartbeat parameters pushed by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Ping interval in milliseconds
    #[serde(rename = "clientInterval", default)]
    pub client_interval: u64,
    /// Pings allowed without an ack
    #[serde(rename = "clientAttempts", default)]
    pub client_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTopic {
    pub topic: String,
}

/// Topic-scoped event message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub topic: String,
    pub event: String,
    pub data: Value,
}

/// Decoded protocol frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    HeartbeatConfig(HeartbeatConfig),
    Join(JoinTopic),
    Event(EventMessage),
    Ping,
    Ack,
    /// A type code this client does not know; carried for logging only
    Unknown(i64),
}

#[derive(Serialize)]
struct OutboundEnvelope<'a, D: Serialize> {
    t: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    d: Option<&'a D>,
}

#[derive(Deserialize)]
struct InboundEnvelope {
    t: i64,
    #[serde(default)]
    d: Option<Value>,
}

impl Frame {
    /// Build the type-1 frame joining `topic`
    pub fn join(topic: impl Into<String>) -> Self {
        Frame::Join(JoinTopic {
            topic: topic.into(),
        })
    }

    /// Build an outbound type-7 frame from raw JSON text
    ///
    /// `event` becomes the frame's topic and the frame's own event name is
    /// always [`OUTBOUND_EVENT`].
    ///
    /// # Errors
    /// `InvalidPayload` if `json` does not parse or is not a JSON object.
    pub fn outbound_event(event: &str, json: &str) -> Result<Self> {
        let data: Value = serde_json::from_str(json)
            .map_err(|e| AdonisError::InvalidPayload(format!("{}: {}", e, json)))?;
        if !data.is_object() {
            return Err(AdonisError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                json
            )));
        }

        Ok(Frame::Event(EventMessage {
            topic: event.to_string(),
            event: OUTBOUND_EVENT.to_string(),
            data,
        }))
    }

    /// Type code of this frame
    pub fn code(&self) -> i64 {
        match self {
            Frame::HeartbeatConfig(_) => FrameType::HeartbeatConfig.code(),
            Frame::Join(_) => FrameType::Join.code(),
            Frame::Event(_) => FrameType::Event.code(),
            Frame::Ping => FrameType::Ping.code(),
            Frame::Ack => FrameType::Ack.code(),
            Frame::Unknown(code) => *code,
        }
    }

    /// Serialize into envelope text
    pub fn encode(&self) -> Result<String> {
        let t = self.code();
        let encoded = match self {
            Frame::HeartbeatConfig(config) => to_text(t, Some(config)),
            Frame::Join(join) => to_text(t, Some(join)),
            Frame::Event(message) => to_text(t, Some(message)),
            Frame::Ping | Frame::Ack | Frame::Unknown(_) => to_text::<()>(t, None),
        };
        encoded.map_err(|e| AdonisError::Encode(e.to_string()))
    }

    /// Parse envelope text
    ///
    /// # Errors
    /// `Decode` for malformed JSON, a missing `t`, or a known type whose
    /// payload lacks required fields. Unknown type codes are not errors.
    pub fn decode(text: &str) -> Result<Self> {
        let envelope: InboundEnvelope = serde_json::from_str(text)?;

        let Some(frame_type) = FrameType::from_code(envelope.t) else {
            return Ok(Frame::Unknown(envelope.t));
        };

        let frame = match frame_type {
            FrameType::HeartbeatConfig => Frame::HeartbeatConfig(payload(envelope.d, frame_type)?),
            FrameType::Join => Frame::Join(payload(envelope.d, frame_type)?),
            FrameType::Event => Frame::Event(payload(envelope.d, frame_type)?),
            FrameType::Ping => Frame::Ping,
            FrameType::Ack => Frame::Ack,
        };
        Ok(frame)
    }
}

fn to_text<D: Serialize>(t: i64, d: Option<&D>) -> serde_json::Result<String> {
    serde_json::to_string(&OutboundEnvelope { t, d })
}

fn payload<T: serde::de::DeserializeOwned>(d: Option<Value>, frame_type: FrameType) -> Result<T> {
    let d = d.ok_or_else(|| {
        AdonisError::Decode(format!("{:?} frame without payload", frame_type))
    })?;
    serde_json::from_value(d)
        .map_err(|e| AdonisError::Decode(format!("{:?} payload: {}", frame_type, e)))
}

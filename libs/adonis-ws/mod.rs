//! # adonis-ws
//!
//! Client for the Adonis WebSocket pub/sub protocol.
//!
//! ## Features
//!
//! - **Topic subscriptions**: join topics and route event messages by topic and event name
//! - **Server-driven heartbeat**: ping cadence and budget come from the server's config frame
//! - **Automatic reconnection**: pluggable strategies, collision backoff by default
//! - **Ordered listeners**: callbacks run on one dispatch thread, never under the session lock
//! - **Pluggable transport**: tokio-tungstenite by default, anything implementing `Transport` otherwise

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use crate::core::{
    builder, client, config, connection_state, envelope, registry, tungstenite,
    builder::{states, ConnectionBuilder},
    client::{Connection, WeakConnection},
    config::{ConnectionConfig, DEFAULT_CLOSE_REASON, NORMAL_CLOSURE},
    connection_state::{ConnectionState, Metrics},
    envelope::{EventMessage, Frame, FrameType, HeartbeatConfig},
    registry::TopicKey,
    tungstenite::TungsteniteTransport,
};

// Payload type handed to topic listeners
pub use serde_json::Value;

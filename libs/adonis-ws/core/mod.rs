//! # adonis-ws core
//!
//! The connection engine: frame codec, listener registry, heartbeat,
//! reconnection and the tokio-tungstenite transport.
//!
//! ## Example
//!
//! ```rust,ignore
//! use adonis_ws::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let connection = adonis_ws::builder()
//!         .url("ws://localhost:3333/adonis-ws")
//!         .header("Authorization", "Bearer token")
//!         .build()?;
//!
//!     let weak = connection.downgrade();
//!     connection
//!         .on_lifecycle(Lifecycle::Open, move |_: &str| {
//!             if let Some(connection) = weak.upgrade() {
//!                 connection.join("chat");
//!             }
//!         })
//!         .on_event_response("chat", "message", |topic: &str, event: &str, data: &Value| {
//!             println!("{}/{}: {}", topic, event, data);
//!         })
//!         .connect();
//!
//!     connection.send_on_open("message", r#"{"body":"hello"}"#);
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub(crate) mod dispatch;
pub mod envelope;
pub(crate) mod heartbeat;
pub mod registry;
pub mod tungstenite;

// Re-export main types
pub use builder::{states, ConnectionBuilder};
pub use client::{Connection, WeakConnection};
pub use config::{ConnectionConfig, DEFAULT_CLOSE_REASON, NORMAL_CLOSURE};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
pub use envelope::{EventMessage, Frame, FrameType, HeartbeatConfig, JoinTopic, OUTBOUND_EVENT};
pub use registry::TopicKey;
pub use tungstenite::TungsteniteTransport;

// Re-export traits for convenience
pub use crate::traits::*;

/// Create a new connection builder
///
/// The URL must be set before `build()` becomes available.
///
/// # Example
/// ```ignore
/// let connection = adonis_ws::builder()
///     .url("wss://example.com/adonis-ws")
///     .reconnect_strategy(FixedDelay::new(Duration::from_secs(2), Some(10)))
///     .build()?;
/// connection.connect();
/// ```
pub fn builder() -> ConnectionBuilder<builder::states::NoUrl, builder::states::DefaultTransport> {
    ConnectionBuilder::new()
}

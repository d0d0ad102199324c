//! Listener capabilities
//!
//! Each kind of observation is its own trait so a caller can implement any
//! subset of them. The connection checks each registry independently; there
//! is no layering between them.
//!
//! Every trait has a blanket implementation for plain closures, so most
//! callers never name these traits:
//!
//! ```ignore
//! connection.on_lifecycle(Lifecycle::Open, |event: &str| info!("{event}"));
//! connection.on_event_response("chat:1", "message", |topic: &str, event: &str, data: &Value| {
//!     info!(topic, event, %data, "chat message");
//! });
//! ```

use crate::core::connection_state::ConnectionState;
use serde_json::Value;
use std::fmt;

/// Pseudo-events produced by the connection itself rather than the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Transport opened; fired before the open-message queue is flushed
    Open,
    /// Transport fully closed
    Closed,
    /// A reconnection attempt has been scheduled
    Reconnecting,
}

impl Lifecycle {
    /// Name passed to the listener when this pseudo-event fires
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Open => "open",
            Lifecycle::Closed => "closed",
            Lifecycle::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observer of a bare event name or a lifecycle pseudo-event
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &str);
}

impl<F> EventListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_event(&self, event: &str) {
        self(event)
    }
}

/// Observer of a topic-scoped event message, receives the decoded payload
pub trait TopicListener: Send + Sync {
    fn on_message(&self, topic: &str, event: &str, data: &Value);
}

impl<F> TopicListener for F
where
    F: Fn(&str, &str, &Value) + Send + Sync,
{
    fn on_message(&self, topic: &str, event: &str, data: &Value) {
        self(topic, event, data)
    }
}

/// Observer of every inbound frame as raw text, including malformed ones
pub trait MessageListener: Send + Sync {
    fn on_raw(&self, text: &str);
}

impl<F> MessageListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_raw(&self, text: &str) {
        self(text)
    }
}

/// Observer of connection state transitions
pub trait StateListener: Send + Sync {
    fn on_change(&self, state: ConnectionState);
}

impl<F> StateListener for F
where
    F: Fn(ConnectionState) + Send + Sync,
{
    fn on_change(&self, state: ConnectionState) {
        self(state)
    }
}

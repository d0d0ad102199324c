//! # adonis-ws traits
//!
//! Core traits and types shared by the engine and its collaborators:
//!
//! - **Transport**: open links and report what happens on them
//! - **Listeners**: observe lifecycle, events, topic messages, raw frames, state
//! - **ReconnectionStrategy**: control reconnection delays
//! - **AdonisError**: the error type used throughout

pub mod error;
pub mod headers;
pub mod listener;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use error::{AdonisError, Result};
pub use headers::Headers;
pub use listener::{EventListener, Lifecycle, MessageListener, StateListener, TopicListener};
pub use reconnect::{CollisionBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy};
pub use transport::{Transport, TransportEvents, TransportHandle};

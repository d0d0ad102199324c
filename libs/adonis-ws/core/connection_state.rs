//! Connection state and counters
//!
//! The authoritative state lives inside the session lock; these atomics
//! mirror it so `Connection::state()` and `Connection::metrics()` never
//! contend with the transport callbacks.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Connection states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// No transport activity; initial state
    Closed = 0,
    /// Transport open requested, waiting for `on_open`
    Opening = 1,
    /// Transport open, frames flow
    Open = 2,
    /// Peer started the close handshake
    Closing = 3,
    /// Transport failed; reconnection is about to be scheduled
    ConnectError = 4,
    /// Reconnection scheduled, waiting out the backoff delay
    ReconnectAttempt = 5,
    /// Backoff elapsed, a new transport is being opened
    Reconnecting = 6,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Closed,
            1 => ConnectionState::Opening,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closing,
            4 => ConnectionState::ConnectError,
            5 => ConnectionState::ReconnectAttempt,
            _ => ConnectionState::Reconnecting,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Closed => "CLOSED",
            ConnectionState::Opening => "OPENING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Closing => "CLOSING",
            ConnectionState::ConnectError => "CONNECT_ERROR",
            ConnectionState::ReconnectAttempt => "RECONNECT_ATTEMPT",
            ConnectionState::Reconnecting => "RECONNECTING",
        }
    }

    /// True while a reconnection cycle is in flight
    pub fn is_recovering(&self) -> bool {
        matches!(
            self,
            ConnectionState::ConnectError
                | ConnectionState::ReconnectAttempt
                | ConnectionState::Reconnecting
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free cell holding a [`ConnectionState`]
#[derive(Debug)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Store a new state, returning the previous one
    #[inline]
    pub fn set(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.inner.swap(state as u8, Ordering::AcqRel))
    }

    #[inline]
    pub fn is(&self, state: ConnectionState) -> bool {
        self.get() == state
    }
}

/// Lock-free counters for traffic and reconnections
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    reconnect_count: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reconnects(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub connection_state: ConnectionState,
}

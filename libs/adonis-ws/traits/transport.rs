//! Transport collaborator contract
//!
//! The connection never touches sockets itself. It asks a [`Transport`] to
//! open a link, keeps the returned [`TransportHandle`] as its single live
//! transport, and receives everything that happens on the link through the
//! [`TransportEvents`] sink it handed over at open time.
//!
//! ```text
//! Connection ──open(url, headers, sink)──> Transport
//!     │                                        │
//!     │<───────────── TransportHandle ─────────┘
//!     │   send / close / cancel
//!     │
//!     └<── on_open / on_message / on_closing / on_closed / on_failure ── sink
//! ```
//!
//! All handle methods are fire-and-forget and must not block on network I/O.
//! Sink callbacks may arrive on any thread. `open`, `send` and `close` are
//! called with the session locked and must never deliver sink events from
//! inside the call; hand them to another task instead. `cancel` runs outside
//! the lock and may report `on_failure` synchronously.

use crate::traits::error::{AdonisError, Result};
use crate::traits::headers::Headers;
use std::sync::Arc;

/// Opens transport links
pub trait Transport: Send + Sync + 'static {
    /// Start opening a link to `url`
    ///
    /// Returns as soon as the attempt is underway. The outcome is reported
    /// through `events`: `on_open` on success, `on_failure` otherwise, never
    /// before `open` has returned.
    ///
    /// # Errors
    /// Only for failures detectable before any I/O (e.g. a malformed URL).
    fn open(
        &self,
        url: &str,
        headers: &Headers,
        events: Arc<dyn TransportEvents>,
    ) -> Result<Box<dyn TransportHandle>>;
}

/// A single live link returned by [`Transport::open`]
pub trait TransportHandle: Send + Sync {
    /// Queue a text frame, returns whether the link accepted it
    fn send(&self, text: &str) -> bool;

    /// Start the close handshake
    fn close(&self, code: u16, reason: &str);

    /// Drop the link immediately, skipping the close handshake
    ///
    /// May call `on_failure` on this link's sink before returning.
    fn cancel(&self);
}

/// Event sink for a single link
pub trait TransportEvents: Send + Sync {
    fn on_open(&self);

    fn on_message(&self, text: String);

    /// Peer sent a close frame
    fn on_closing(&self, code: u16, reason: String);

    /// Close handshake finished, the link is gone
    fn on_closed(&self, code: u16, reason: String);

    fn on_failure(&self, error: AdonisError);
}

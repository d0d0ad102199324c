//! Connection state machine
//!
//! ```text
//!            connect()                on_open
//!  CLOSED ─────────────> OPENING ─────────────> OPEN
//!    ▲                      ▲                     │ on_closing
//!    │ on_closed            │ connect()           ▼
//!    └──────────────────────┼──────────────── CLOSING
//!                           │
//!                      RECONNECTING <── backoff ── RECONNECT_ATTEMPT <── CONNECT_ERROR <── on_failure
//! ```
//!
//! Every transition happens under the session lock. Listener calls chosen
//! during a transition are queued on the dispatch thread, so they observe
//! transitions in order and never run while the lock is held. Discarded links
//! are cancelled only after the lock is released, so a transport may report
//! the resulting failure from inside `cancel`.

use crate::core::config::{ConnectionConfig, NORMAL_CLOSURE};
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
use crate::core::dispatch::Dispatcher;
use crate::core::envelope::{Frame, HeartbeatConfig};
use crate::core::heartbeat::Heartbeat;
use crate::core::registry::{ListenerRegistry, TopicKey};
use crate::traits::*;
use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Client side of an Adonis WebSocket session
///
/// Cheap to clone; all clones drive the same session. Every operation is
/// fire-and-forget: outcomes are observed through the registered listeners.
/// Dropping the last clone tears the session down like [`terminate`](Self::terminate).
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

/// Non-owning handle, for listeners that call back into their own connection
#[derive(Clone)]
pub struct WeakConnection {
    inner: Weak<Inner>,
}

impl WeakConnection {
    pub fn upgrade(&self) -> Option<Connection> {
        self.inner.upgrade().map(|inner| Connection { inner })
    }
}

struct Inner {
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    runtime: Handle,
    state: AtomicConnectionState,
    metrics: AtomicMetrics,
    session: Mutex<Session>,
    dispatcher: Dispatcher,
    /// Handed to transport sinks and timers so they never keep the session alive
    self_ref: Weak<Inner>,
}

struct Session {
    /// The single live transport, if any
    link: Option<Box<dyn TransportHandle>>,
    /// Discarded links, cancelled once the session lock is released
    retired: Vec<Box<dyn TransportHandle>>,
    /// Bumped whenever a link is opened or discarded; stale sink events are dropped
    generation: u64,
    reconnection_attempts: u32,
    /// Set by `terminate`, consumed by the next failure callback
    skip_failure: bool,
    terminated: bool,
    heartbeat: Heartbeat,
    reconnect_task: Option<JoinHandle<()>>,
    registry: ListenerRegistry,
}

impl Connection {
    pub(crate) fn new(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Result<Self> {
        let dispatcher = Dispatcher::spawn()?;

        let inner = Arc::new_cyclic(|self_ref| Inner {
            config,
            transport,
            runtime,
            state: AtomicConnectionState::new(ConnectionState::Closed),
            metrics: AtomicMetrics::new(),
            session: Mutex::new(Session {
                link: None,
                retired: Vec::new(),
                generation: 0,
                reconnection_attempts: 0,
                skip_failure: false,
                terminated: false,
                heartbeat: Heartbeat::new(),
                reconnect_task: None,
                registry: ListenerRegistry::new(),
            }),
            dispatcher,
            self_ref: self_ref.clone(),
        });

        Ok(Self { inner })
    }

    pub fn downgrade(&self) -> WeakConnection {
        WeakConnection {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Start the connection if it is not already started
    ///
    /// No-op while a live transport is opening or open. A connection whose
    /// transport closed is reopened.
    pub fn connect(&self) -> &Self {
        let mut session = self.inner.lock_session();
        self.inner.connect_locked(&mut session);
        self
    }

    /// Join `topic`; returns whether the transport accepted the frame
    pub fn join(&self, topic: &str) -> bool {
        let mut session = self.inner.lock_session();
        self.inner.send_frame_locked(&mut session, &Frame::join(topic))
    }

    /// Send `data` (JSON object text) as a message on `event`
    ///
    /// Returns false, after logging, when `data` is not a JSON object or the
    /// transport refused the frame.
    pub fn send(&self, event: &str, data: &str) -> bool {
        let mut session = self.inner.lock_session();
        self.inner.send_event_locked(&mut session, event, data)
    }

    /// Send now if open, otherwise queue until the next open
    ///
    /// Only the latest payload per event name is kept.
    pub fn send_on_open(&self, event: &str, data: &str) {
        let mut session = self.inner.lock_session();
        if self.inner.state.is(ConnectionState::Open) {
            self.inner.send_event_locked(&mut session, event, data);
        } else {
            debug!("Queueing '{}' until the connection opens", event);
            session.registry.open_queue().push(event, data);
        }
    }

    /// Listen for a lifecycle pseudo-event, replacing any previous listener
    pub fn on_lifecycle(&self, lifecycle: Lifecycle, listener: impl EventListener + 'static) -> &Self {
        self.inner
            .session
            .lock()
            .registry
            .set_lifecycle(lifecycle, Arc::new(listener));
        self
    }

    pub fn remove_lifecycle_listener(&self, lifecycle: Lifecycle) {
        self.inner.lock_session().registry.remove_lifecycle(lifecycle);
    }

    /// Listen for event messages named `event` on any topic
    pub fn on_event(&self, event: impl Into<String>, listener: impl EventListener + 'static) -> &Self {
        self.inner
            .session
            .lock()
            .registry
            .set_event(event, Arc::new(listener));
        self
    }

    /// Listen for event messages named `event` on `topic`, with their payload
    pub fn on_event_response(
        &self,
        topic: impl Into<String>,
        event: impl Into<String>,
        listener: impl TopicListener + 'static,
    ) -> &Self {
        self.inner
            .session
            .lock()
            .registry
            .set_topic(TopicKey::new(topic, event), Arc::new(listener));
        self
    }

    pub fn remove_event_response_listener(&self, topic: &str, event: &str) {
        self.inner
            .session
            .lock()
            .registry
            .remove_topic(&TopicKey::new(topic, event));
    }

    /// Remove the listener for `event` and any payload queued for it
    pub fn remove_event_listener(&self, event: &str) {
        self.inner.lock_session().registry.remove_event(event);
    }

    /// Receive every inbound frame as raw text, even ones that fail to decode
    pub fn set_message_listener(&self, listener: impl MessageListener + 'static) -> &Self {
        self.inner
            .session
            .lock()
            .registry
            .set_message(Some(Arc::new(listener)));
        self
    }

    /// Observe every state transition
    pub fn set_state_listener(&self, listener: impl StateListener + 'static) -> &Self {
        self.inner
            .session
            .lock()
            .registry
            .set_state(Some(Arc::new(listener)));
        self
    }

    /// Remove lifecycle, event, message and state listeners
    ///
    /// Topic listeners registered with `on_event_response` stay in place.
    pub fn clear_listeners(&self) {
        self.inner.lock_session().registry.clear();
    }

    /// Ask the peer to close; the state follows the transport's callbacks
    pub fn close(&self, code: u16, reason: &str) {
        let session = self.inner.lock_session();
        match &session.link {
            Some(link) => {
                info!("Closing connection ({}: {})", code, reason);
                link.close(code, reason);
            }
            None => debug!("close() without a live transport"),
        }
    }

    /// Normal closure with the configured reason
    pub fn close_normal(&self) {
        self.close(NORMAL_CLOSURE, self.inner.config.close_reason());
    }

    /// Drop the transport and every timer immediately
    ///
    /// Skips the close handshake. The connection accepts no further work.
    pub fn terminate(&self) {
        let mut session = self.inner.lock_session();
        info!("Terminating connection");
        session.skip_failure = true;
        session.terminated = true;
        self.inner.teardown_locked(&mut session);
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.lock_session().terminated
    }

    /// Reconnection attempts since the last successful open
    pub fn reconnection_attempts(&self) -> u32 {
        self.inner.lock_session().reconnection_attempts
    }

    /// Pings still allowed before the server must acknowledge
    pub fn heartbeat_remaining(&self) -> u32 {
        self.inner.lock_session().heartbeat.remaining()
    }

    /// Payloads waiting for the next open
    pub fn pending_on_open(&self) -> usize {
        self.inner.lock_session().registry.open_queue().len()
    }

    pub fn metrics(&self) -> Metrics {
        let metrics = &self.inner.metrics;
        Metrics {
            messages_sent: metrics.messages_sent(),
            messages_received: metrics.messages_received(),
            reconnect_count: metrics.reconnect_count(),
            connection_state: self.inner.state.get(),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.inner.config.url())
            .field("state", &self.inner.state.get())
            .finish()
    }
}

impl Inner {
    fn lock_session(&self) -> SessionGuard<'_> {
        SessionGuard(self.session.lock())
    }

    fn change_state(&self, session: &Session, state: ConnectionState) {
        let previous = self.state.set(state);
        if previous != state {
            info!("Connection state {} -> {}", previous, state);
        }

        if let Some(listener) = session.registry.state() {
            self.dispatcher.dispatch(move || listener.on_change(state));
        }
    }

    fn fire_lifecycle(&self, session: &Session, lifecycle: Lifecycle) {
        if let Some(listener) = session.registry.lifecycle(lifecycle) {
            self.dispatcher
                .dispatch(move || listener.on_event(lifecycle.as_str()));
        }
    }

    fn connect_locked(&self, session: &mut Session) {
        if session.terminated {
            warn!("connect() ignored: {}", AdonisError::Terminated);
            return;
        }

        let state = self.state.get();
        if session.link.is_none() {
            self.open_link(session);
        } else if state == ConnectionState::Closed {
            self.discard_link(session);
            self.open_link(session);
        } else {
            debug!("connect() ignored, connection is {}", state);
        }
    }

    fn open_link(&self, session: &mut Session) {
        session.generation += 1;
        let sink = Arc::new(SessionSink {
            inner: self.self_ref.clone(),
            generation: session.generation,
        });

        info!("Connecting to {}", self.config.url());
        match self.transport.open(self.config.url(), self.config.headers(), sink) {
            Ok(link) => {
                session.link = Some(link);
                self.change_state(session, ConnectionState::Opening);
            }
            Err(e) => {
                error!("Failed to open transport: {}", e);
                self.fail_locked(session, &e);
            }
        }
    }

    /// Retire the live link, if any, and disown its pending events
    fn discard_link(&self, session: &mut Session) {
        if let Some(link) = session.link.take() {
            session.retired.push(link);
        }
        session.generation += 1;
    }

    fn teardown_locked(&self, session: &mut Session) {
        self.discard_link(session);
        session.heartbeat.stop();
        if let Some(task) = session.reconnect_task.take() {
            task.abort();
        }
    }

    fn send_text_locked(&self, session: &mut Session, text: &str) -> bool {
        match &session.link {
            Some(link) => {
                debug!("Sending {}", text);
                let accepted = link.send(text);
                if accepted {
                    self.metrics.increment_sent();
                } else {
                    warn!("Transport refused frame {}", text);
                }
                accepted
            }
            None => {
                warn!("No live transport, dropping frame {}", text);
                false
            }
        }
    }

    fn send_frame_locked(&self, session: &mut Session, frame: &Frame) -> bool {
        match frame.encode() {
            Ok(text) => self.send_text_locked(session, &text),
            Err(e) => {
                error!("Failed to encode frame: {}", e);
                false
            }
        }
    }

    fn send_event_locked(&self, session: &mut Session, event: &str, data: &str) -> bool {
        match Frame::outbound_event(event, data) {
            Ok(frame) => self.send_frame_locked(session, &frame),
            Err(e) => {
                error!("Tried to send data with wrong JSON format: {}", e);
                false
            }
        }
    }

    fn fail_locked(&self, session: &mut Session, error: &AdonisError) {
        if session.skip_failure {
            session.skip_failure = false;
            debug!("Ignoring failure after terminate: {}", error);
            return;
        }
        if session.terminated || self.state.is(ConnectionState::ConnectError) {
            return;
        }

        info!(
            "Socket connection failed ({}), trying to reconnect (attempt {})",
            error, session.reconnection_attempts
        );
        self.change_state(session, ConnectionState::ConnectError);
        self.reconnect_locked(session);
    }

    fn reconnect_locked(&self, session: &mut Session) {
        if !self.state.is(ConnectionState::ConnectError) {
            return;
        }

        self.change_state(session, ConnectionState::ReconnectAttempt);
        self.discard_link(session);
        session.heartbeat.stop();
        self.fire_lifecycle(session, Lifecycle::Reconnecting);

        let attempt = session.reconnection_attempts;
        let Some(delay) = self.config.reconnect_strategy().next_delay(attempt) else {
            warn!("Reconnection strategy exhausted after {} attempts, stopping", attempt);
            self.change_state(session, ConnectionState::Closed);
            return;
        };

        info!("Reconnecting in {:?} (attempt {})", delay, attempt + 1);
        if let Some(previous) = session.reconnect_task.take() {
            previous.abort();
        }

        let weak = self.self_ref.clone();
        session.reconnect_task = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.resume_reconnect();
            }
        }));
    }

    fn resume_reconnect(&self) {
        let mut session = self.lock_session();
        session.reconnect_task = None;

        if session.terminated || !self.state.is(ConnectionState::ReconnectAttempt) {
            debug!("Reconnection timer fired in state {}, skipping", self.state.get());
            return;
        }

        self.change_state(&session, ConnectionState::Reconnecting);
        session.reconnection_attempts += 1;
        self.metrics.increment_reconnects();
        self.connect_locked(&mut session);
    }

    /// Lock the session for a sink event, or `None` if the event is stale
    fn session_for(&self, generation: u64) -> Option<SessionGuard<'_>> {
        let session = self.lock_session();
        if session.generation != generation || session.terminated {
            debug!(
                "Dropping event from stale transport (generation {}, current {})",
                generation, session.generation
            );
            return None;
        }
        Some(session)
    }

    fn handle_open(&self, generation: u64) {
        let Some(mut session) = self.session_for(generation) else {
            return;
        };
        info!("Socket has been opened successfully");

        session.reconnection_attempts = 0;
        self.fire_lifecycle(&session, Lifecycle::Open);

        for (event, data) in session.registry.open_queue().drain() {
            self.send_event_locked(&mut session, &event, &data);
        }

        self.change_state(&session, ConnectionState::Open);
    }

    fn handle_message(&self, generation: u64, text: String) {
        let Some(mut session) = self.session_for(generation) else {
            return;
        };
        self.metrics.increment_received();
        debug!("New message received {}", text);

        match Frame::decode(&text) {
            Ok(Frame::HeartbeatConfig(config)) => self.configure_heartbeat(&mut session, config),
            Ok(Frame::Event(message)) => {
                if let Some(listener) = session.registry.topic(&message.topic, &message.event) {
                    let message = message.clone();
                    self.dispatcher.dispatch(move || {
                        listener.on_message(&message.topic, &message.event, &message.data)
                    });
                }
                if let Some(listener) = session.registry.event(&message.event) {
                    self.dispatcher
                        .dispatch(move || listener.on_event(&message.event));
                }
            }
            Ok(Frame::Ack) => session.heartbeat.acknowledge(),
            Ok(Frame::Join(_)) | Ok(Frame::Ping) => {
                debug!("Ignoring client-bound frame type from server");
            }
            Ok(Frame::Unknown(code)) => {
                debug!("Ignoring frame with unknown type {}", code);
            }
            Err(e) => {
                error!("Failed to decode frame: {}", e);
            }
        }

        if let Some(listener) = session.registry.message() {
            self.dispatcher.dispatch(move || listener.on_raw(&text));
        }
    }

    fn configure_heartbeat(&self, session: &mut Session, config: HeartbeatConfig) {
        let weak = self.self_ref.clone();
        let ping = Box::new(move || match weak.upgrade() {
            Some(inner) => {
                let mut session = inner.lock_session();
                inner.send_frame_locked(&mut session, &Frame::Ping);
                true
            }
            None => false,
        });
        session.heartbeat.configure(&self.runtime, config, ping);
    }

    fn handle_closing(&self, generation: u64, code: u16, reason: String) {
        let Some(session) = self.session_for(generation) else {
            return;
        };
        if self.state.is(ConnectionState::Closed) {
            return;
        }
        info!("Close request from server ({}) with reason '{}'", code, reason);

        self.change_state(&session, ConnectionState::Closing);
        if let Some(link) = &session.link {
            link.close(NORMAL_CLOSURE, &reason);
        }
    }

    fn handle_closed(&self, generation: u64, code: u16, reason: String) {
        let Some(mut session) = self.session_for(generation) else {
            return;
        };
        info!("Socket connection closed ({}) with reason '{}'", code, reason);

        session.heartbeat.stop();
        self.change_state(&session, ConnectionState::Closed);
        self.fire_lifecycle(&session, Lifecycle::Closed);
    }

    fn handle_failure(&self, generation: u64, error: AdonisError) {
        let mut session = self.lock_session();
        // A terminate() swallows exactly one failure, whichever link reports it
        if !session.skip_failure && (session.generation != generation || session.terminated) {
            debug!("Dropping failure from stale transport: {}", error);
            return;
        }
        self.fail_locked(&mut session, &error);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let session = self.session.get_mut();
        for link in session.link.take().into_iter().chain(session.retired.drain(..)) {
            link.cancel();
        }
        session.heartbeat.stop();
        if let Some(task) = session.reconnect_task.take() {
            task.abort();
        }
    }
}

/// Session lock that cancels retired links after unlocking
struct SessionGuard<'a>(MutexGuard<'a, Session>);

impl Deref for SessionGuard<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.0
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.0
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let retired = std::mem::take(&mut self.0.retired);
        if retired.is_empty() {
            return;
        }
        // Cancellation may call straight back into the sink
        MutexGuard::unlocked(&mut self.0, || {
            for link in retired {
                link.cancel();
            }
        });
    }
}

/// Transport sink bound to one link generation
struct SessionSink {
    inner: Weak<Inner>,
    generation: u64,
}

impl TransportEvents for SessionSink {
    fn on_open(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_open(self.generation);
        }
    }

    fn on_message(&self, text: String) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_message(self.generation, text);
        }
    }

    fn on_closing(&self, code: u16, reason: String) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_closing(self.generation, code, reason);
        }
    }

    fn on_closed(&self, code: u16, reason: String) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_closed(self.generation, code, reason);
        }
    }

    fn on_failure(&self, error: AdonisError) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_failure(self.generation, error);
        }
    }
}

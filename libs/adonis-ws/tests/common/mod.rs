//! Common test utilities for adonis-ws integration tests
//!
//! This module provides a scripted in-memory transport, a mock Adonis
//! WebSocket server and small waiting helpers.

#![allow(dead_code)]

use adonis_ws::{AdonisError, Headers, Result, Transport, TransportEvents, TransportHandle};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Poll `condition` until it holds or `timeout` elapses
///
/// Yields to the runtime between polls so timers spawned by the connection
/// keep running on a current-thread runtime.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Shorthand for the common 2 second wait
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    wait_until(Duration::from_secs(2), condition).await
}

/// Shared, append-only log filled from listener callbacks
#[derive(Clone, Default)]
pub struct Recorder {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.lock().iter().any(|e| e == entry)
    }
}

/// Everything one `open` call produced
pub struct MockLink {
    pub url: String,
    pub headers: Headers,
    pub sink: Arc<dyn TransportEvents>,
    pub sent: Vec<String>,
    pub closes: Vec<(u16, String)>,
    pub cancelled: bool,
}

#[derive(Default)]
struct MockState {
    links: Vec<MockLink>,
    fail_open: bool,
    refuse_sends: bool,
    fail_on_cancel: bool,
}

/// Scripted in-memory transport
///
/// `open` only records the link; tests drive it by firing events through
/// [`MockTransport::sink`]. Never fire events from inside `open`; `cancel`
/// reports a failure synchronously when [`set_fail_on_cancel`](Self::set_fail_on_cancel) is on.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `open` fail synchronously
    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Make `cancel` report `on_failure` before returning, like a socket reset
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.state.lock().fail_on_cancel = fail;
    }

    /// Make every handle report sends as refused
    pub fn set_refuse_sends(&self, refuse: bool) {
        self.state.lock().refuse_sends = refuse;
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().links.len()
    }

    pub fn sink(&self, link: usize) -> Arc<dyn TransportEvents> {
        Arc::clone(&self.state.lock().links[link].sink)
    }

    pub fn last_sink(&self) -> Arc<dyn TransportEvents> {
        let state = self.state.lock();
        Arc::clone(&state.links.last().expect("no link opened").sink)
    }

    pub fn sent(&self, link: usize) -> Vec<String> {
        self.state.lock().links[link].sent.clone()
    }

    /// Sent frames of every link, parsed
    pub fn all_sent(&self) -> Vec<Value> {
        self.state
            .lock()
            .links
            .iter()
            .flat_map(|link| link.sent.iter())
            .map(|text| serde_json::from_str(text).expect("sent frame is JSON"))
            .collect()
    }

    pub fn closes(&self, link: usize) -> Vec<(u16, String)> {
        self.state.lock().links[link].closes.clone()
    }

    pub fn is_cancelled(&self, link: usize) -> bool {
        self.state.lock().links[link].cancelled
    }

    pub fn url(&self, link: usize) -> String {
        self.state.lock().links[link].url.clone()
    }

    pub fn headers(&self, link: usize) -> Headers {
        self.state.lock().links[link].headers.clone()
    }
}

impl Transport for MockTransport {
    fn open(
        &self,
        url: &str,
        headers: &Headers,
        events: Arc<dyn TransportEvents>,
    ) -> Result<Box<dyn TransportHandle>> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(AdonisError::Transport("scripted open failure".to_string()));
        }

        state.links.push(MockLink {
            url: url.to_string(),
            headers: headers.clone(),
            sink: events,
            sent: Vec::new(),
            closes: Vec::new(),
            cancelled: false,
        });

        Ok(Box::new(MockHandle {
            index: state.links.len() - 1,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockHandle {
    index: usize,
    state: Arc<Mutex<MockState>>,
}

impl TransportHandle for MockHandle {
    fn send(&self, text: &str) -> bool {
        let mut state = self.state.lock();
        if state.refuse_sends {
            return false;
        }
        state.links[self.index].sent.push(text.to_string());
        true
    }

    fn close(&self, code: u16, reason: &str) {
        self.state.lock().links[self.index]
            .closes
            .push((code, reason.to_string()));
    }

    fn cancel(&self) {
        let sink = {
            let mut state = self.state.lock();
            state.links[self.index].cancelled = true;
            state
                .fail_on_cancel
                .then(|| Arc::clone(&state.links[self.index].sink))
        };
        if let Some(sink) = sink {
            sink.on_failure(AdonisError::ConnectionClosed("cancelled".to_string()));
        }
    }
}

/// Server side frames
pub mod frames {
    use serde_json::{json, Value};

    pub fn heartbeat_config(interval_ms: u64, attempts: u32) -> String {
        json!({"t": 0, "d": {"clientInterval": interval_ms, "clientAttempts": attempts}}).to_string()
    }

    pub fn event(topic: &str, event: &str, data: Value) -> String {
        json!({"t": 7, "d": {"topic": topic, "event": event, "data": data}}).to_string()
    }

    pub fn ack() -> String {
        json!({"t": 9}).to_string()
    }
}

/// A mock Adonis WebSocket server
///
/// On every connection it pushes a heartbeat config, answers pings with
/// acks, confirms joins with a `joined` event on the topic and echoes
/// client events back on the `echo` topic.
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    received: Arc<Mutex<Vec<Value>>>,
}

impl MockWsServer {
    /// Create and start a new mock server
    pub async fn start(heartbeat_interval_ms: u64, heartbeat_attempts: u32) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                let received = received_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(
                                        stream,
                                        shutdown,
                                        received,
                                        heartbeat_interval_ms,
                                        heartbeat_attempts,
                                    )
                                    .await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown,
            received,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        shutdown: Arc<Notify>,
        received: Arc<Mutex<Vec<Value>>>,
        heartbeat_interval_ms: u64,
        heartbeat_attempts: u32,
    ) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;
        use tokio_tungstenite::tungstenite::Message;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        let config = frames::heartbeat_config(heartbeat_interval_ms, heartbeat_attempts);
        if write.send(Message::Text(config)).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                                continue;
                            };
                            received.lock().push(frame.clone());

                            let reply = match frame["t"].as_i64() {
                                Some(1) => Some(frames::event(
                                    frame["d"]["topic"].as_str().unwrap_or_default(),
                                    "joined",
                                    json!({}),
                                )),
                                Some(7) => Some(frames::event(
                                    "echo",
                                    frame["d"]["topic"].as_str().unwrap_or_default(),
                                    frame["d"]["data"].clone(),
                                )),
                                Some(8) => Some(frames::ack()),
                                _ => None,
                            };

                            if let Some(reply) = reply {
                                if write.send(Message::Text(reply)).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            // tungstenite queues the close reply and flushes it on the next read
                            continue;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}/adonis-ws", self.addr)
    }

    /// Frames received from clients so far, parsed
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    pub fn count_type(&self, t: i64) -> usize {
        self.received
            .lock()
            .iter()
            .filter(|frame| frame["t"].as_i64() == Some(t))
            .count()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

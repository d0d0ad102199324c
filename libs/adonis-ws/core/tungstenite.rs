//! Production transport over tokio-tungstenite
//!
//! Each `open` spawns one Tokio task that owns the socket:
//!
//! ```text
//! TungsteniteHandle ──Outgoing──> mpsc ──┐
//!                                        ▼
//!                              ┌───────────────────┐
//!                              │  link task        │──> on_open / on_message
//!                              │  select! {        │──> on_closing / on_closed
//!                              │    read.next()    │──> on_failure
//!                              │    outgoing.recv()│
//!                              │  }                │
//!                              └───────────────────┘
//! ```
//!
//! `cancel` aborts the task, so a cancelled link reports nothing further.

use crate::traits::*;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{http, Error as WsError, Message};
use tokio_tungstenite::connect_async;
use tracing::{debug, error, warn};

/// Close code reported when the peer's close frame carried no status
const NO_STATUS_RECEIVED: u16 = 1005;

/// [`Transport`] backed by tokio-tungstenite
pub struct TungsteniteTransport {
    runtime: Handle,
}

impl TungsteniteTransport {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl Transport for TungsteniteTransport {
    fn open(
        &self,
        url: &str,
        headers: &Headers,
        events: Arc<dyn TransportEvents>,
    ) -> Result<Box<dyn TransportHandle>> {
        let mut request = url
            .into_client_request()
            .map_err(|e| AdonisError::Configuration(format!("invalid url {}: {}", url, e)))?;

        // Apply headers to request
        for (key, value) in headers {
            match key.parse::<http::header::HeaderName>() {
                Ok(header_name) => match value.parse::<http::header::HeaderValue>() {
                    Ok(header_value) => {
                        request.headers_mut().insert(header_name, header_value);
                    }
                    Err(_) => {
                        warn!("Invalid header value for key '{}': {}", key, value);
                    }
                },
                Err(_) => {
                    warn!("Invalid header name: {}", key);
                }
            }
        }

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let task = self.runtime.spawn(run_link(request, events, outgoing_rx));

        Ok(Box::new(TungsteniteHandle { outgoing_tx, task }))
    }
}

#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close(u16, String),
}

struct TungsteniteHandle {
    outgoing_tx: mpsc::UnboundedSender<Outgoing>,
    task: JoinHandle<()>,
}

impl TransportHandle for TungsteniteHandle {
    fn send(&self, text: &str) -> bool {
        !self.task.is_finished() && self.outgoing_tx.send(Outgoing::Text(text.to_string())).is_ok()
    }

    fn close(&self, code: u16, reason: &str) {
        if self
            .outgoing_tx
            .send(Outgoing::Close(code, reason.to_string()))
            .is_err()
        {
            debug!("Close requested on a finished link");
        }
    }

    fn cancel(&self) {
        self.task.abort();
    }
}

async fn run_link(
    request: http::Request<()>,
    events: Arc<dyn TransportEvents>,
    mut outgoing_rx: mpsc::UnboundedReceiver<Outgoing>,
) {
    let ws_stream = match connect_async(request).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            error!("Failed to connect: {}", e);
            events.on_failure(AdonisError::Transport(e.to_string()));
            return;
        }
    };

    events.on_open();

    let (mut write, mut read) = ws_stream.split();
    // Set once the peer's close frame arrives; the stream ending afterwards is a clean close
    let mut peer_close: Option<(u16, String)> = None;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        events.on_message(text);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!("Ignoring binary frame ({} bytes)", data.len());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.into_owned()))
                            .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                        peer_close = Some((code, reason.clone()));
                        events.on_closing(code, reason);
                    }
                    Some(Ok(_)) => {
                        // Ping/pong frames are answered by tungstenite itself
                    }
                    Some(Err(WsError::ConnectionClosed)) | None => {
                        match peer_close.take() {
                            Some((code, reason)) => events.on_closed(code, reason),
                            None => events.on_failure(AdonisError::ConnectionClosed(
                                "stream ended without close frame".into(),
                            )),
                        }
                        return;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        events.on_failure(AdonisError::Transport(e.to_string()));
                        return;
                    }
                }
            }

            cmd = outgoing_rx.recv() => {
                match cmd {
                    Some(Outgoing::Text(text)) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            error!("Failed to send frame: {}", e);
                            events.on_failure(AdonisError::Transport(e.to_string()));
                            return;
                        }
                    }
                    Some(Outgoing::Close(code, reason)) => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        // Fails harmlessly when answering a close we already echoed
                        if let Err(e) = write.send(Message::Close(Some(frame))).await {
                            debug!("Close frame not sent: {}", e);
                        }
                    }
                    None => {
                        debug!("Link handle dropped, closing socket");
                        let _ = write.close().await;
                        return;
                    }
                }
            }
        }
    }
}

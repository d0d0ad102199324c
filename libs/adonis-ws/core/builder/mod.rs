pub mod states;

use crate::core::client::Connection;
use crate::core::config::{validate_url, ConnectionConfig, DEFAULT_CLOSE_REASON};
use crate::core::tungstenite::TungsteniteTransport;
use crate::traits::headers::is_valid_header;
use crate::traits::*;
use states::*;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Type-state builder for [`Connection`]
///
/// This builder uses Rust's type system to enforce that the URL is set
/// before the connection can be built, and that a transport is chosen at
/// most once.
pub struct ConnectionBuilder<U, T>
where
    U: UrlState,
    T: TransportState,
{
    _state: TypeState<U, T>,
    url: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    headers: Headers,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    close_reason: Option<String>,
}

impl ConnectionBuilder<NoUrl, DefaultTransport> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            url: None,
            transport: None,
            headers: Headers::new(),
            reconnect_strategy: None,
            close_reason: None,
        }
    }
}

impl Default for ConnectionBuilder<NoUrl, DefaultTransport> {
    fn default() -> Self {
        Self::new()
    }
}

// URL setting
impl<T> ConnectionBuilder<NoUrl, T>
where
    T: TransportState,
{
    /// Set the WebSocket URL; checked for a ws/wss scheme at build time
    pub fn url(self, url: impl Into<String>) -> ConnectionBuilder<HasUrl, T> {
        ConnectionBuilder {
            _state: TypeState::new(),
            url: Some(url.into()),
            transport: self.transport,
            headers: self.headers,
            reconnect_strategy: self.reconnect_strategy,
            close_reason: self.close_reason,
        }
    }
}

// Transport setting
impl<U> ConnectionBuilder<U, DefaultTransport>
where
    U: UrlState,
{
    /// Replace the default tokio-tungstenite transport
    pub fn transport(
        self,
        transport: impl Transport + 'static,
    ) -> ConnectionBuilder<U, CustomTransport> {
        ConnectionBuilder {
            _state: TypeState::new(),
            url: self.url,
            transport: Some(Arc::new(transport)),
            headers: self.headers,
            reconnect_strategy: self.reconnect_strategy,
            close_reason: self.close_reason,
        }
    }
}

// Optional configuration methods
impl<U, T> ConnectionBuilder<U, T>
where
    U: UrlState,
    T: TransportState,
{
    /// Add a header to the upgrade request
    ///
    /// Headers are keyed by name: repeating a name replaces the earlier
    /// value rather than sending the header twice.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Defaults to [`CollisionBackoff::default`]
    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Reason sent by `close_normal`
    pub fn close_reason(mut self, reason: impl Into<String>) -> Self {
        self.close_reason = Some(reason.into());
        self
    }

    fn finish(self, transport: Arc<dyn Transport>, runtime: Handle) -> Result<Connection> {
        let url = self
            .url
            .ok_or_else(|| AdonisError::Configuration("URL must be set".to_string()))?;
        validate_url(&url)?;

        if let Some((name, value)) = self
            .headers
            .iter()
            .find(|(name, value)| !is_valid_header(name, value))
        {
            return Err(AdonisError::Configuration(format!(
                "invalid header {:?}: {:?}",
                name, value
            )));
        }

        let config = ConnectionConfig {
            url,
            headers: self.headers,
            reconnect_strategy: self
                .reconnect_strategy
                .unwrap_or_else(|| Box::new(CollisionBackoff::default())),
            close_reason: self
                .close_reason
                .unwrap_or_else(|| DEFAULT_CLOSE_REASON.to_string()),
        };

        Connection::new(config, transport, runtime)
    }
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|e| {
        AdonisError::Configuration(format!("connection must be built inside a Tokio runtime: {}", e))
    })
}

// Build methods - only available once the URL is set
impl ConnectionBuilder<HasUrl, DefaultTransport> {
    /// Build a connection over tokio-tungstenite
    ///
    /// The connection starts `CLOSED`; call `connect()` to open it.
    pub fn build(self) -> Result<Connection> {
        let runtime = current_runtime()?;
        let transport = Arc::new(TungsteniteTransport::new(runtime.clone()));
        self.finish(transport, runtime)
    }
}

impl ConnectionBuilder<HasUrl, CustomTransport> {
    /// Build a connection over the configured transport
    pub fn build(mut self) -> Result<Connection> {
        let runtime = current_runtime()?;
        let transport = self
            .transport
            .take()
            .ok_or_else(|| AdonisError::Configuration("transport must be set".to_string()))?;
        self.finish(transport, runtime)
    }
}

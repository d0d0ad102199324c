use crate::traits::*;

/// Close code sent by `Connection::close_normal`
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close reason sent by `Connection::close_normal` unless overridden
pub const DEFAULT_CLOSE_REASON: &str = "End of session";

/// Immutable configuration for a [`Connection`](crate::core::client::Connection)
///
/// Built once by the type-state builder and never mutated afterwards, so
/// every reconnection replays exactly the same URL and headers.
pub struct ConnectionConfig {
    /// WebSocket URL (wss:// or ws://)
    pub(crate) url: String,

    /// Headers sent with every upgrade request
    pub(crate) headers: Headers,

    /// Reconnection strategy
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,

    /// Reason sent with `close_normal`
    pub(crate) close_reason: String,
}

impl ConnectionConfig {
    /// Get a reference to the URL
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn close_reason(&self) -> &str {
        &self.close_reason
    }

    pub fn reconnect_strategy(&self) -> &dyn ReconnectionStrategy {
        self.reconnect_strategy.as_ref()
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("close_reason", &self.close_reason)
            .finish_non_exhaustive()
    }
}

/// Check that `url` uses a WebSocket scheme
pub(crate) fn validate_url(url: &str) -> Result<()> {
    let lower = url.get(..4).map(str::to_ascii_lowercase).unwrap_or_default();
    if lower.starts_with("ws:") || lower.starts_with("wss:") {
        Ok(())
    } else {
        Err(AdonisError::Configuration(format!(
            "web socket url must start with ws or wss, passed url is {}",
            url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_ws_schemes() {
        assert!(validate_url("ws://localhost:3333/adonis-ws").is_ok());
        assert!(validate_url("wss://example.com/adonis-ws").is_ok());
        assert!(validate_url("WSS://EXAMPLE.COM").is_ok());
    }

    #[test]
    fn test_validate_url_rejects_other_schemes() {
        assert!(matches!(
            validate_url("http://example.com"),
            Err(AdonisError::Configuration(_))
        ));
        assert!(validate_url("ws").is_err());
        assert!(validate_url("").is_err());
    }
}

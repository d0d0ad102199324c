use std::collections::HashMap;

/// HTTP headers sent with the WebSocket upgrade request
///
/// The same set is replayed on every connection attempt, including
/// reconnections, so anything time-sensitive (tokens, nonces) must be
/// refreshed by building a new connection. One value per name; multi-valued
/// headers must be joined by the caller.
pub type Headers = HashMap<String, String>;

/// Check that a header pair can go on the wire as-is
///
/// Rejects empty names and CR/LF anywhere, which would otherwise split
/// the upgrade request.
pub fn is_valid_header(name: &str, value: &str) -> bool {
    !name.is_empty()
        && !name.contains(['\r', '\n', ':'])
        && !value.contains(['\r', '\n'])
}

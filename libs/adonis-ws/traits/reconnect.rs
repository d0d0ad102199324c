use std::time::Duration;

/// Default cap on the collision exponent
pub const MAX_COLLISION: u32 = 7;

/// Default backoff slot: half a second
pub const DEFAULT_SLOT: Duration = Duration::from_millis(500);

/// Trait for defining reconnection strategies
///
/// Implement this trait to control how long the connection waits in
/// `RECONNECT_ATTEMPT` before opening a new transport.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - Reconnection attempts made since the last successful open
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Stop reconnecting
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Truncated binary exponential backoff
///
/// The delay for `attempt` is `(2^c - 1) * slot` with `c = min(attempt, max_collision)`.
/// With the default half-second slot and a cap of 7 this yields
/// 0, 0.5, 1.5, 3.5, 7.5, 15.5, 31.5 and then 63.5 seconds forever.
#[derive(Debug, Clone)]
pub struct CollisionBackoff {
    slot: Duration,
    max_collision: u32,
    max_attempts: Option<u32>,
}

impl CollisionBackoff {
    /// Create a new collision backoff strategy
    ///
    /// # Arguments
    /// * `slot` - Duration of one backoff slot
    /// * `max_collision` - Highest exponent used, bounding the maximum delay
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(slot: Duration, max_collision: u32, max_attempts: Option<u32>) -> Self {
        Self {
            slot,
            max_collision,
            max_attempts,
        }
    }
}

impl Default for CollisionBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_SLOT, MAX_COLLISION, None)
    }
}

impl ReconnectionStrategy for CollisionBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }

        // Shift must stay below 32
        let collision = attempt.min(self.max_collision).min(31);
        let slots = (1u32 << collision) - 1;
        Some(self.slot.saturating_mul(slots))
    }
}

/// Fixed delay reconnection strategy
///
/// Always waits the same amount of time between reconnection attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    /// Create a new fixed delay strategy
    ///
    /// # Arguments
    /// * `delay` - The fixed delay between reconnects
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self { delay, max_attempts }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }
        Some(self.delay)
    }
}

/// Never reconnect strategy
///
/// A failed connection goes to `CLOSED` and stays there until the
/// application calls `connect()` again.
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }
}

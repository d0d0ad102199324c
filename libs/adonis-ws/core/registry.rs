//! Listener registry and open-message queue
//!
//! Holds every callback the application registered plus the frames waiting
//! for the next `OPEN` transition. Lives inside the session lock, so nothing
//! here synchronizes on its own.

use crate::traits::listener::{EventListener, Lifecycle, MessageListener, StateListener, TopicListener};
use std::collections::HashMap;
use std::sync::Arc;

/// Composite key for topic-scoped listeners
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicKey {
    pub topic: String,
    pub event: String,
}

impl TopicKey {
    pub fn new(topic: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
        }
    }
}

/// Payloads queued by `send_on_open`, one per event name
///
/// Flush order is first-insertion order; re-queueing an event name replaces
/// its payload in place.
#[derive(Debug, Default)]
pub struct OpenQueue {
    entries: Vec<(String, String)>,
}

impl OpenQueue {
    pub fn push(&mut self, event: impl Into<String>, data: impl Into<String>) {
        let event = event.into();
        let data = data.into();
        match self.entries.iter_mut().find(|(queued, _)| *queued == event) {
            Some(entry) => entry.1 = data,
            None => self.entries.push((event, data)),
        }
    }

    pub fn remove(&mut self, event: &str) -> Option<String> {
        let index = self.entries.iter().position(|(queued, _)| queued == event)?;
        Some(self.entries.remove(index).1)
    }

    /// Take every pending entry, leaving the queue empty
    pub fn drain(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All application callbacks, keyed by what they observe
///
/// Registering under an existing key replaces the previous listener.
#[derive(Default)]
pub struct ListenerRegistry {
    lifecycle: HashMap<Lifecycle, Arc<dyn EventListener>>,
    events: HashMap<String, Arc<dyn EventListener>>,
    topics: HashMap<TopicKey, Arc<dyn TopicListener>>,
    message: Option<Arc<dyn MessageListener>>,
    state: Option<Arc<dyn StateListener>>,
    open_queue: OpenQueue,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_lifecycle(&mut self, lifecycle: Lifecycle, listener: Arc<dyn EventListener>) {
        self.lifecycle.insert(lifecycle, listener);
    }

    pub fn remove_lifecycle(&mut self, lifecycle: Lifecycle) -> bool {
        self.lifecycle.remove(&lifecycle).is_some()
    }

    pub fn lifecycle(&self, lifecycle: Lifecycle) -> Option<Arc<dyn EventListener>> {
        self.lifecycle.get(&lifecycle).cloned()
    }

    pub fn set_event(&mut self, event: impl Into<String>, listener: Arc<dyn EventListener>) {
        self.events.insert(event.into(), listener);
    }

    pub fn event(&self, event: &str) -> Option<Arc<dyn EventListener>> {
        self.events.get(event).cloned()
    }

    /// Drop the listener for `event` together with any payload queued for it
    pub fn remove_event(&mut self, event: &str) {
        self.events.remove(event);
        self.open_queue.remove(event);
    }

    pub fn set_topic(&mut self, key: TopicKey, listener: Arc<dyn TopicListener>) {
        self.topics.insert(key, listener);
    }

    pub fn remove_topic(&mut self, key: &TopicKey) -> bool {
        self.topics.remove(key).is_some()
    }

    pub fn topic(&self, topic: &str, event: &str) -> Option<Arc<dyn TopicListener>> {
        // Borrowed lookups on a struct key need an owned probe
        self.topics.get(&TopicKey::new(topic, event)).cloned()
    }

    pub fn set_message(&mut self, listener: Option<Arc<dyn MessageListener>>) {
        self.message = listener;
    }

    pub fn message(&self) -> Option<Arc<dyn MessageListener>> {
        self.message.clone()
    }

    pub fn set_state(&mut self, listener: Option<Arc<dyn StateListener>>) {
        self.state = listener;
    }

    pub fn state(&self) -> Option<Arc<dyn StateListener>> {
        self.state.clone()
    }

    /// Remove lifecycle, event, message and state listeners
    ///
    /// Topic listeners and the open-message queue are left untouched.
    pub fn clear(&mut self) {
        self.lifecycle.clear();
        self.events.clear();
        self.message = None;
        self.state = None;
    }

    pub fn open_queue(&mut self) -> &mut OpenQueue {
        &mut self.open_queue
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

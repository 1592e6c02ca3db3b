//! Notification buffer - per-destination message accumulator shared between
//! the stream listener and the flush scheduler

use std::collections::HashMap;
use std::sync::Mutex;

/// Pending notifications, keyed by destination identifier.
///
/// The single piece of shared mutable state in the process. Appends from the
/// listener and drains from the flush scheduler are serialized by one mutex;
/// critical sections only touch the map, never the network.
#[derive(Debug, Default)]
pub struct NotificationBuffer {
    inner: Mutex<HashMap<String, Vec<String>>>,
}

impl NotificationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one message for a destination, preserving arrival order.
    pub fn append(&self, destination: impl Into<String>, text: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entry(destination.into()).or_default().push(text.into());
    }

    /// Atomically take everything queued so far, leaving the buffer empty.
    ///
    /// Destinations with no pending messages never appear in the snapshot;
    /// after a drain the buffer observably holds nothing.
    pub fn drain_all(&self) -> HashMap<String, Vec<String>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *inner)
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.is_empty()
    }

    /// Number of destinations with pending messages.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.len()
    }
}

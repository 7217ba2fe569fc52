//! Receiver side of the tracker's event channel
//!
//! # Example
//!
//! ```rust,ignore
//! let (tracker, mut events) = Tracker::new(bus, TrackerConfig::from_env());
//!
//! while let Some(event) = events.recv().await {
//!     println!("{} {}", event.name(), event.payload());
//! }
//!
//! // Drain whatever is queued without waiting
//! for event in events.try_iter() {
//!     println!("{}", event.name());
//! }
//! ```

use std::time::Duration;
use tokio::sync::mpsc;

use crate::event::TrackerEvent;

/// Stream of [`TrackerEvent`]s in emission order
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<TrackerEvent>,
}

impl EventReceiver {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<TrackerEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the tracker has been dropped and the queue is empty.
    pub async fn recv(&mut self) -> Option<TrackerEvent> {
        self.rx.recv().await
    }

    /// Wait for the next event for at most `timeout`
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<TrackerEvent> {
        tokio::time::timeout(timeout, self.rx.recv()).await.ok().flatten()
    }

    /// Take the next event if one is queued
    pub fn try_recv(&mut self) -> Option<TrackerEvent> {
        self.rx.try_recv().ok()
    }

    /// Iterate over the events currently queued
    pub fn try_iter(&mut self) -> TryIter<'_> {
        TryIter { inner: self }
    }
}

/// Non-blocking iterator over currently queued events
pub struct TryIter<'a> {
    inner: &'a mut EventReceiver,
}

impl Iterator for TryIter<'_> {
    type Item = TrackerEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

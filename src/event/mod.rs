//! Event model shared with the stream-processing engine.
//!
//! # Data Flow
//! ```text
//! engine event (payload + stream attributes)
//!     → sink element (publish as HTTP request / reply)
//!
//! HTTP message (payload + transport facts)
//!     → metadata.rs (declared attributes + protocol fields)
//!     → Event
//!     → EventConsumer (engine input handler)
//! ```

pub mod metadata;

use tokio::sync::mpsc;

pub use metadata::{ProtocolInfo, TransportMetadata};

/// A materialized event: mapped payload plus transport metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub payload: String,
    pub metadata: TransportMetadata,
}

impl Event {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            metadata: TransportMetadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: TransportMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set a single attribute value.
    pub fn with_attribute(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(name, value);
        self
    }
}

/// Capability to push a materialized event downstream.
///
/// Implementations must tolerate delivery after their pipeline element has been
/// torn down; such events are dropped.
pub trait EventConsumer: Send + Sync {
    fn on_event(&self, event: Event);
}

impl EventConsumer for mpsc::UnboundedSender<Event> {
    fn on_event(&self, event: Event) {
        if self.send(event).is_err() {
            tracing::debug!("Consumer closed, dropping event");
        }
    }
}

impl EventConsumer for mpsc::Sender<Event> {
    fn on_event(&self, event: Event) {
        if let Err(e) = self.try_send(event) {
            tracing::warn!(error = %e, "Consumer unavailable, dropping event");
        }
    }
}

/// Consumer that only logs what it receives.
#[derive(Debug, Clone)]
pub struct LoggingConsumer {
    name: String,
}

impl LoggingConsumer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl EventConsumer for LoggingConsumer {
    fn on_event(&self, event: Event) {
        tracing::info!(
            element = %self.name,
            payload = %event.payload,
            metadata = ?event.metadata,
            "Event received"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_channel_drops_silently() {
        let (tx, rx) = mpsc::unbounded_channel::<Event>();
        drop(rx);
        tx.on_event(Event::new("late"));
    }

    #[tokio::test]
    async fn channel_consumer_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        tx.on_event(Event::new("hello").with_attribute("id", 7));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.payload, "hello");
        assert_eq!(event.metadata.get_str("id").as_deref(), Some("7"));
    }
}

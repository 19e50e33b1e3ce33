//! Event publisher over a tokio broadcast channel.

use serde_json::Value;
use tokio::sync::broadcast;

/// High-throughput event publisher for job and push lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use fleetcast_core::events::EventPublisher;
    /// use serde_json::json;
    ///
    /// let publisher = EventPublisher::new(16);
    /// let mut rx = publisher.subscribe();
    /// tokio_test::block_on(async {
    ///     publisher
    ///         .publish("job.created", json!({"job_id": "j-1"}))
    ///         .await;
    ///     assert_eq!(rx.recv().await.unwrap().name, "job.created");
    /// });
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event with the given name and context. Infallible: a
    /// broadcast send only errors when nobody is subscribed, and publishing
    /// without listeners is fine here.
    pub async fn publish(&self, event_name: impl Into<String>, context: Value) {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}

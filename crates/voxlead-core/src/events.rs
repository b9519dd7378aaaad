//! Event system for decoupled downstream integration.
//!
//! The ingestion pipeline emits an event after a call record is written so
//! that collaborators owning derived state (agent performance caches,
//! dashboard aggregates) can invalidate themselves. Dispatch is
//! fire-and-forget: handlers must never block or fail the pipeline.
//!
//! This architecture enables:
//! - **Loose coupling**: the pipeline does not reference cache internals
//! - **Extensibility**: new subscribers can be added without changes
//! - **Testability**: handlers can be tested in isolation

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AgentId, CallId, CallStatus, UserId};

/// Events emitted by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A call record was created or updated.
    CallRecorded(CallRecordedEvent),
}

/// Event emitted after the call upsert commits.
///
/// Consumers use this to invalidate any cached view of the agent's
/// performance; the pipeline does not wait for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecordedEvent {
    /// The call that was written.
    pub call_id: CallId,

    /// The provider's conversation identifier.
    pub conversation_id: String,

    /// The agent that handled the call.
    pub agent_id: AgentId,

    /// The owning user.
    pub user_id: UserId,

    /// Status the call transitioned to.
    pub status: CallStatus,

    /// When the record was written.
    pub recorded_at: DateTime<Utc>,
}

/// Handler for pipeline events.
///
/// Implementations must not block ingestion. If event handling fails, it
/// should log the error but never propagate it back to the pipeline.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync + std::fmt::Debug {
    /// Handles a pipeline event.
    async fn handle_event(&self, event: PipelineEvent);
}

/// Event handler that distributes events to multiple subscribers.
///
/// All subscribers receive every event concurrently; a slow subscriber
/// delays only its peers in the same dispatch, never the pipeline's
/// response to the provider.
#[derive(Debug, Default)]
pub struct MulticastEventHandler {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl MulticastEventHandler {
    /// Creates an empty multicast handler.
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Registers a subscriber.
    pub fn add_subscriber(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }
}

#[async_trait::async_trait]
impl EventHandler for MulticastEventHandler {
    async fn handle_event(&self, event: PipelineEvent) {
        let futures = self.handlers.iter().map(|handler| {
            let event = event.clone();
            async move {
                handler.handle_event(event).await;
            }
        });

        futures::future::join_all(futures).await;
    }
}

/// Event handler that ignores all events.
///
/// Default wiring for deployments without cache subscribers.
#[derive(Debug, Default)]
pub struct NoOpEventHandler;

impl NoOpEventHandler {
    /// Creates a new no-op event handler.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl EventHandler for NoOpEventHandler {
    async fn handle_event(&self, _event: PipelineEvent) {}
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug)]
    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl EventHandler for CountingHandler {
        async fn handle_event(&self, _event: PipelineEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sample_event() -> PipelineEvent {
        PipelineEvent::CallRecorded(CallRecordedEvent {
            call_id: CallId::new(),
            conversation_id: "conv_test_001".into(),
            agent_id: AgentId::new(),
            user_id: UserId::new(),
            status: CallStatus::Completed,
            recorded_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn noop_handler_accepts_events() {
        NoOpEventHandler::new().handle_event(sample_event()).await;
    }

    #[tokio::test]
    async fn multicast_forwards_to_all_subscribers() {
        let mut multicast = MulticastEventHandler::new();
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));

        multicast.add_subscriber(Arc::new(CountingHandler { count: count_a.clone() }));
        multicast.add_subscriber(Arc::new(CountingHandler { count: count_b.clone() }));
        assert_eq!(multicast.subscriber_count(), 2);

        multicast.handle_event(sample_event()).await;

        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }
}

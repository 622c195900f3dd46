use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domains::envelope::Envelope;
use crate::domains::run::FetchEvent;
use crate::interfaces::relay::RelayService;
use crate::services::registry::RunRegistry;

/// Sends delivery receipts without holding up the fetch pipeline.
///
/// Each acknowledgment is attempted once. Failures are logged and published
/// as events; they are never retried or returned to the caller. When a
/// registry is attached, each request counts as pending there until it
/// settles, so `wait_idle` covers it.
#[derive(Clone)]
pub struct Acknowledger {
    relay: Arc<dyn RelayService>,
    events: Option<broadcast::Sender<FetchEvent>>,
    registry: Option<Arc<RunRegistry>>,
}

impl Acknowledger {
    pub fn new(relay: Arc<dyn RelayService>) -> Self {
        Self {
            relay,
            events: None,
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<RunRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_events(mut self, events: broadcast::Sender<FetchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Start acknowledging `envelope` in the background. The returned handle
    /// may be dropped.
    pub fn acknowledge(&self, envelope: &Envelope) -> JoinHandle<()> {
        let relay = self.relay.clone();
        let events = self.events.clone();
        let source = envelope.source.clone();
        let timestamp = envelope.timestamp;
        let pending = self.registry.as_ref().map(|registry| registry.track_ack());

        tokio::spawn(async move {
            let _pending = pending;
            match relay.acknowledge(&source, timestamp).await {
                Ok(()) => {
                    debug!(%source, timestamp, "acknowledged delivery");
                }
                Err(err) => {
                    warn!(%source, timestamp, error = %err, "acknowledging delivery failed");
                    if let Some(events) = events {
                        let _ = events.send(FetchEvent::AcknowledgeFailed {
                            source,
                            timestamp,
                            error: err.to_string(),
                        });
                    }
                }
            }
        })
    }
}

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::codec::response::parse;
use crate::config::DEFAULT_EVENT_BUFFER;
use crate::domains::page::FetchPage;
use crate::domains::run::{FetchEvent, RunId, RunState};
use crate::error::Result;
use crate::interfaces::relay::{
    MessageHandler, NoopPushDelivery, PushDelivery, RelayService, StaticRestriction,
    TransportRestriction,
};
use crate::services::acknowledger::Acknowledger;
use crate::services::registry::RunRegistry;

struct FetcherInner {
    relay: Arc<dyn RelayService>,
    handler: Arc<dyn MessageHandler>,
    acknowledger: Acknowledger,
    restriction: Arc<dyn TransportRestriction>,
    push: Arc<dyn PushDelivery>,
    registry: Arc<RunRegistry>,
    events: broadcast::Sender<FetchEvent>,
    run_gate: Option<Mutex<()>>,
}

/// Drives fetch runs: fetch a page, hand every envelope to the handler,
/// acknowledge it, and continue in a fresh run while the relay reports more.
///
/// Cloning is cheap and every clone shares the same in-flight registry.
#[derive(Clone)]
pub struct MessageFetcher {
    inner: Arc<FetcherInner>,
}

pub struct MessageFetcherBuilder {
    relay: Arc<dyn RelayService>,
    handler: Arc<dyn MessageHandler>,
    restriction: Arc<dyn TransportRestriction>,
    push: Arc<dyn PushDelivery>,
    serialize_runs: bool,
    event_buffer: usize,
}

impl MessageFetcherBuilder {
    pub fn restriction(mut self, restriction: Arc<dyn TransportRestriction>) -> Self {
        self.restriction = restriction;
        self
    }

    pub fn push_delivery(mut self, push: Arc<dyn PushDelivery>) -> Self {
        self.push = push;
        self
    }

    /// Let at most one run fetch and process at a time. Off by default.
    pub fn serialize_runs(mut self, serialize: bool) -> Self {
        self.serialize_runs = serialize;
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn build(self) -> MessageFetcher {
        let (events, _) = broadcast::channel(self.event_buffer);
        let registry = Arc::new(RunRegistry::new());
        let acknowledger = Acknowledger::new(self.relay.clone())
            .with_events(events.clone())
            .with_registry(registry.clone());
        MessageFetcher {
            inner: Arc::new(FetcherInner {
                relay: self.relay,
                handler: self.handler,
                acknowledger,
                restriction: self.restriction,
                push: self.push,
                registry,
                events,
                run_gate: self.serialize_runs.then(|| Mutex::new(())),
            }),
        }
    }
}

impl MessageFetcher {
    pub fn builder(
        relay: Arc<dyn RelayService>,
        handler: Arc<dyn MessageHandler>,
    ) -> MessageFetcherBuilder {
        MessageFetcherBuilder {
            relay,
            handler,
            restriction: Arc::new(StaticRestriction(true)),
            push: Arc::new(NoopPushDelivery),
            serialize_runs: false,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Start one run in the background and return its id.
    ///
    /// Returns `None` without fetching when the transport is not restricted
    /// (push delivery is asked to take over instead) or when called outside a
    /// Tokio runtime. Safe to call concurrently; overlapping runs are allowed.
    pub fn run(&self) -> Option<RunId> {
        if !self.inner.restriction.is_restricted() {
            info!("transport not restricted, delegating message fetching to push delivery");
            self.inner.push.become_active(true);
            return None;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                error!(error = %err, "cannot start message fetch run outside a tokio runtime");
                return None;
            }
        };

        let run_id = self.inner.registry.begin();
        info!(%run_id, "starting message fetch run");
        self.emit(FetchEvent::RunStarted { run_id });

        let fetcher = self.clone();
        let handle = runtime.spawn(async move { fetcher.drive(run_id).await });
        self.inner.registry.attach(run_id, handle);
        Some(run_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FetchEvent> {
        self.inner.events.subscribe()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn in_flight_ids(&self) -> Vec<RunId> {
        self.inner.registry.ids()
    }

    pub fn run_state(&self, run_id: RunId) -> Option<RunState> {
        self.inner.registry.state(run_id)
    }

    pub fn pending_acks(&self) -> usize {
        self.inner.registry.pending_acks()
    }

    /// Resolve once every run, including pagination continuations, has
    /// finished and every acknowledgment it sent has settled.
    pub async fn wait_idle(&self) {
        self.inner.registry.wait_idle().await
    }

    async fn drive(self, run_id: RunId) {
        self.transition(run_id, RunState::Fetching);

        let outcome = {
            let _gate = match &self.inner.run_gate {
                Some(gate) => Some(gate.lock().await),
                None => None,
            };
            AssertUnwindSafe(self.execute(run_id)).catch_unwind().await
        };

        let (state, more) = match outcome {
            Ok(Ok(more)) => (RunState::Completed, more),
            Ok(Err(err)) => {
                warn!(%run_id, error = %err, "message fetch run failed");
                (RunState::Failed, false)
            }
            Err(_) => {
                error!(%run_id, "message fetch run panicked");
                (RunState::Failed, false)
            }
        };

        let continued_as = if more {
            info!(%run_id, "more messages pending, continuing in a new run");
            self.run()
        } else {
            None
        };

        self.transition(run_id, state);
        self.inner.registry.remove(run_id);
        debug!(%run_id, ?state, "cleaned up message fetch run");
        self.emit(FetchEvent::RunFinished {
            run_id,
            state,
            continued_as,
        });
    }

    /// Fetch and process one page. Returns the page's `more` flag.
    async fn execute(&self, run_id: RunId) -> Result<bool> {
        let page = self.fetch_page().await?;
        self.transition(run_id, RunState::ProcessingPage);
        self.process_page(run_id, &page).await;
        self.transition(run_id, RunState::Recursing);
        Ok(page.more)
    }

    async fn fetch_page(&self) -> Result<FetchPage> {
        let body = self.inner.relay.fetch_messages().await?;
        Ok(parse(body.as_ref())?)
    }

    async fn process_page(&self, run_id: RunId, page: &FetchPage) {
        debug!(%run_id, count = page.envelopes.len(), more = page.more, "processing page");
        for envelope in &page.envelopes {
            debug!(
                %run_id,
                source = %envelope.source,
                timestamp = envelope.timestamp,
                "received envelope"
            );
            self.inner.handler.handle_envelope(envelope).await;
            self.emit(FetchEvent::EnvelopeHandled {
                run_id,
                source: envelope.source.clone(),
                timestamp: envelope.timestamp,
            });
            self.inner.acknowledger.acknowledge(envelope);
        }
    }

    fn transition(&self, run_id: RunId, state: RunState) {
        self.inner.registry.set_state(run_id, state);
        self.emit(FetchEvent::RunStateChanged { run_id, state });
    }

    fn emit(&self, event: FetchEvent) {
        let _ = self.inner.events.send(event);
    }
}

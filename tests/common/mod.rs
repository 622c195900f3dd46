#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use relay_fetcher::error::{RelayFetcherError, Result};
use relay_fetcher::interfaces::relay::{
    MessageHandler, PushDelivery, RelayService, TransportRestriction,
};
use relay_fetcher::{Envelope, FetchEvent};

pub enum Scripted {
    Body(Option<Value>),
    Fail(String),
}

pub struct ScriptedFetch {
    pub delay: Duration,
    pub reply: Scripted,
}

impl ScriptedFetch {
    pub fn body(value: Value) -> Self {
        Self {
            delay: Duration::ZERO,
            reply: Scripted::Body(Some(value)),
        }
    }

    pub fn delayed(delay: Duration, value: Value) -> Self {
        Self {
            delay,
            reply: Scripted::Body(Some(value)),
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            reply: Scripted::Fail(message.to_string()),
        }
    }
}

/// Relay fake that replays scripted fetch replies and records acks. Once the
/// script is exhausted it answers with an empty, final page.
pub struct ScriptedRelay {
    script: Mutex<VecDeque<ScriptedFetch>>,
    pub fetches: AtomicUsize,
    pub acks: Mutex<Vec<(String, u64)>>,
    failing_ack_sources: HashSet<String>,
    ack_delay: Duration,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRelay {
    pub fn new(script: Vec<ScriptedFetch>, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            script: Mutex::new(VecDeque::from(script)),
            fetches: AtomicUsize::new(0),
            acks: Mutex::new(Vec::new()),
            failing_ack_sources: HashSet::new(),
            ack_delay: Duration::ZERO,
            log,
        }
    }

    pub fn failing_acks_for(mut self, source: &str) -> Self {
        self.failing_ack_sources.insert(source.to_string());
        self
    }

    pub fn with_ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = delay;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn ack_count(&self) -> usize {
        self.acks.lock().unwrap().len()
    }
}

#[async_trait]
impl RelayService for ScriptedRelay {
    async fn fetch_messages(&self) -> Result<Option<Value>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let Some(next) = next else {
            return Ok(Some(json!({"messages": [], "more": false})));
        };
        if !next.delay.is_zero() {
            tokio::time::sleep(next.delay).await;
        }
        match next.reply {
            Scripted::Body(body) => Ok(body),
            Scripted::Fail(message) => Err(RelayFetcherError::Http(message)),
        }
    }

    async fn acknowledge(&self, source: &str, timestamp: u64) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("ack:{source}:{timestamp}"));
        if !self.ack_delay.is_zero() {
            tokio::time::sleep(self.ack_delay).await;
        }
        if self.failing_ack_sources.contains(source) {
            return Err(RelayFetcherError::Http("ack rejected".to_string()));
        }
        self.acks
            .lock()
            .unwrap()
            .push((source.to_string(), timestamp));
        Ok(())
    }
}

pub struct RecordingHandler {
    pub seen: Mutex<Vec<Envelope>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingHandler {
    pub fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            log,
        }
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn sources(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|envelope| envelope.source.clone())
            .collect()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle_envelope(&self, envelope: &Envelope) {
        self.log
            .lock()
            .unwrap()
            .push(format!("handle:{}:{}", envelope.source, envelope.timestamp));
        self.seen.lock().unwrap().push(envelope.clone());
    }
}

pub struct FlagRestriction(pub AtomicBool);

impl TransportRestriction for FlagRestriction {
    fn is_restricted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct CountingPush {
    pub activations: AtomicUsize,
}

impl PushDelivery for CountingPush {
    fn become_active(&self, _expect_message: bool) {
        self.activations.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn message(source: &str, timestamp: u64) -> Value {
    json!({
        "type": 1,
        "relay": "",
        "timestamp": timestamp,
        "source": source,
        "sourceDevice": 1,
        "content": "aGVsbG8="
    })
}

pub fn page(messages: Vec<Value>, more: bool) -> Value {
    json!({"messages": messages, "more": more})
}

pub fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

/// Poll `condition` until it holds or a second passes.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met within 1s");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn drain_events(rx: &mut broadcast::Receiver<FetchEvent>) -> Vec<FetchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

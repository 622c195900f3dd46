use async_trait::async_trait;
use serde_json::Value;

use crate::domains::envelope::Envelope;
use crate::error::Result;

/// Outbound requests to the message relay.
#[async_trait]
pub trait RelayService: Send + Sync {
    /// Fetch the next page of undelivered messages. `Ok(None)` means the
    /// relay answered successfully with an empty body.
    async fn fetch_messages(&self) -> Result<Option<Value>>;

    /// Confirm local delivery of the message identified by `source` and
    /// `timestamp`.
    async fn acknowledge(&self, source: &str, timestamp: u64) -> Result<()>;
}

/// Consumer of decoded envelopes. Called exactly once per decoded envelope,
/// before that envelope is acknowledged.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_envelope(&self, envelope: &Envelope);
}

/// Answers whether push delivery is blocked, which is the precondition for
/// polling at all.
pub trait TransportRestriction: Send + Sync {
    fn is_restricted(&self) -> bool;
}

/// Push-style delivery used whenever the transport is not restricted.
pub trait PushDelivery: Send + Sync {
    fn become_active(&self, expect_message: bool);
}

pub struct StaticRestriction(pub bool);

impl TransportRestriction for StaticRestriction {
    fn is_restricted(&self) -> bool {
        self.0
    }
}

/// Push delivery for hosts that have none wired up; it only logs.
pub struct NoopPushDelivery;

impl PushDelivery for NoopPushDelivery {
    fn become_active(&self, expect_message: bool) {
        tracing::info!(expect_message, "push delivery requested but not configured");
    }
}

use crate::domains::envelope::Envelope;

/// Decoded result of one fetch response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchPage {
    /// Successfully decoded envelopes, in server order.
    pub envelopes: Vec<Envelope>,
    /// Whether the relay has more messages queued behind this page.
    pub more: bool,
}

impl FetchPage {
    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }
}

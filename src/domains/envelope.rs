use serde::Serialize;

/// Wire type codes understood by the relay. Codes outside this set are
/// rejected during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    Unknown,
    Ciphertext,
    KeyExchange,
    PrekeyBundle,
    Receipt,
}

impl EnvelopeType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Ciphertext),
            2 => Some(Self::KeyExchange),
            3 => Some(Self::PrekeyBundle),
            5 => Some(Self::Receipt),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::Ciphertext => 1,
            Self::KeyExchange => 2,
            Self::PrekeyBundle => 3,
            Self::Receipt => 5,
        }
    }
}

/// One decoded message unit as delivered by the relay.
///
/// Only the codec builds these; once built they are read-only and handed to
/// the message handler and then to the acknowledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub envelope_type: EnvelopeType,
    pub relay: Option<String>,
    pub timestamp: u64,
    pub source: String,
    pub source_device: u32,
    pub legacy_message: Option<Vec<u8>>,
    pub content: Option<Vec<u8>>,
}

impl Envelope {
    pub fn has_body(&self) -> bool {
        self.legacy_message.is_some() || self.content.is_some()
    }
}

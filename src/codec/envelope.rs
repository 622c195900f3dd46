use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domains::envelope::{Envelope, EnvelopeType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("message record has no integer type")]
    MissingType,
    #[error("message record has unknown type {0}")]
    InvalidType(i64),
    #[error("message record has no timestamp")]
    MissingTimestamp,
    #[error("message record has no source")]
    MissingSource,
    #[error("message record has no sourceDevice")]
    MissingSourceDevice,
}

/// Decode one element of a `messages` array.
///
/// Required fields are checked in wire order and the first problem wins.
/// Optional fields that are present but unusable are dropped instead of
/// failing the record.
pub fn decode(record: &Map<String, Value>) -> Result<Envelope, DecodeError> {
    let code = record
        .get("type")
        .and_then(Value::as_i64)
        .ok_or(DecodeError::MissingType)?;
    let envelope_type = i32::try_from(code)
        .ok()
        .and_then(EnvelopeType::from_code)
        .ok_or(DecodeError::InvalidType(code))?;

    let relay = record
        .get("relay")
        .and_then(Value::as_str)
        .map(str::to_string);

    let timestamp = record
        .get("timestamp")
        .and_then(Value::as_u64)
        .ok_or(DecodeError::MissingTimestamp)?;

    let source = record
        .get("source")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(DecodeError::MissingSource)?;

    let source_device = record
        .get("sourceDevice")
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .ok_or(DecodeError::MissingSourceDevice)?;

    Ok(Envelope {
        envelope_type,
        relay,
        timestamp,
        source,
        source_device,
        legacy_message: optional_bytes(record, "message"),
        content: optional_bytes(record, "content"),
    })
}

fn optional_bytes(record: &Map<String, Value>, key: &str) -> Option<Vec<u8>> {
    let encoded = record.get(key).and_then(Value::as_str)?;
    BASE64.decode(encoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn first_missing_required_field_is_reported() {
        let err = decode(&record(json!({"type": 1}))).unwrap_err();
        assert_eq!(err, DecodeError::MissingTimestamp);

        let err = decode(&record(json!({"timestamp": 1, "source": "a"}))).unwrap_err();
        assert_eq!(err, DecodeError::MissingType);
    }

    #[test]
    fn type_codes_outside_i32_are_invalid() {
        let err = decode(&record(json!({"type": 4_294_967_297i64}))).unwrap_err();
        assert_eq!(err, DecodeError::InvalidType(4_294_967_297));
    }
}

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::envelope::decode;
use crate::domains::page::FetchPage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("response body was empty")]
    MissingBody,
    #[error("response body was not an object")]
    NotAnObject,
    #[error("messages was not a list of objects")]
    MissingMessages,
}

/// Turn one fetch response body into a page.
///
/// Shape problems reject the whole page. Records that fail to decode are
/// dropped and the rest of the page is kept in server order.
pub fn parse(body: Option<&Value>) -> Result<FetchPage, ParseError> {
    let body = match body {
        Some(Value::Null) | None => return Err(ParseError::MissingBody),
        Some(body) => body,
    };
    let body = body.as_object().ok_or(ParseError::NotAnObject)?;

    let records = body
        .get("messages")
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingMessages)?
        .iter()
        .map(Value::as_object)
        .collect::<Option<Vec<&Map<String, Value>>>>()
        .ok_or(ParseError::MissingMessages)?;

    let more = match body.get("more") {
        Some(Value::Bool(more)) => *more,
        _ => {
            debug!("more flag missing or not a bool, assuming no more messages");
            false
        }
    };

    let mut envelopes = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match decode(record) {
            Ok(envelope) => envelopes.push(envelope),
            Err(err) => warn!(index, error = %err, "dropping undecodable message record"),
        }
    }

    Ok(FetchPage { envelopes, more })
}

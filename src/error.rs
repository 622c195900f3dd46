use thiserror::Error;

use crate::codec::response::ParseError;

#[derive(Debug, Error)]
pub enum RelayFetcherError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("unable to process server response: {0}")]
    Protocol(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<ParseError> for RelayFetcherError {
    fn from(err: ParseError) -> Self {
        Self::Protocol(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RelayFetcherError>;

pub mod client;
pub mod codec;
pub mod config;
pub mod domains;
pub mod error;
pub mod factories;
pub mod interfaces;
pub mod providers;
pub mod scheduler;
pub mod services;

pub use crate::client::RelayFetcher;
pub use crate::config::Config;
pub use crate::domains::envelope::{Envelope, EnvelopeType};
pub use crate::domains::page::FetchPage;
pub use crate::domains::run::{FetchEvent, RunId, RunState};
pub use crate::error::{RelayFetcherError, Result};
pub use crate::services::fetcher::MessageFetcher;

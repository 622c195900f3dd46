pub mod acknowledger;
pub mod fetcher;
pub mod poller;
pub mod registry;
pub mod transport;

pub mod relay;
pub mod scheduler;
pub mod transport;

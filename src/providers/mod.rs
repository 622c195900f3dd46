pub mod http_relay;

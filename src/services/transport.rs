use std::fmt::Display;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use arti_client::{TorClient, TorClientConfig};
use tor_rtcompat::PreferredRuntime;

use crate::error::{RelayFetcherError, Result};
use crate::interfaces::transport::{RelayStream, Transport};

fn dial_error(label: &str, host: &str, port: u16, err: impl Display) -> RelayFetcherError {
    RelayFetcherError::Http(format!(
        "{label} connection to relay {host}:{port} failed: {err}"
    ))
}

/// Dials relay hosts through a bootstrapped Tor client. Used for onion
/// relays, which stay reachable where direct connections are blocked.
pub struct TorTransport {
    client: TorClient<PreferredRuntime>,
}

impl TorTransport {
    pub async fn new() -> Result<Self> {
        Self::with_config(TorClientConfig::default()).await
    }

    pub async fn with_config(config: TorClientConfig) -> Result<Self> {
        debug!("bootstrapping tor client for relay connections");
        let client = TorClient::create_bootstrapped(config)
            .await
            .map_err(|e| RelayFetcherError::Runtime(format!("tor bootstrap failed: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for TorTransport {
    fn label(&self) -> &str {
        "tor"
    }

    async fn connect(&self, host: &str, port: u16) -> Result<RelayStream> {
        let stream = self
            .client
            .connect((host, port))
            .await
            .map_err(|e| dial_error(self.label(), host, port, e))?;
        Ok(Box::new(stream))
    }
}

/// Plain TCP, for relays on a trusted network and for tests.
pub struct LocalTransport;

#[async_trait]
impl Transport for LocalTransport {
    fn label(&self) -> &str {
        "tcp"
    }

    async fn connect(&self, host: &str, port: u16) -> Result<RelayStream> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| dial_error(self.label(), host, port, e))?;
        stream.set_nodelay(true).ok();
        Ok(Box::new(stream))
    }
}

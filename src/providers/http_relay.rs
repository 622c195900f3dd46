use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use http::header::{AUTHORIZATION, HOST};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper::Request;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tracing::debug;

use crate::config::{RelayConfig, TransportMode};
use crate::error::{RelayFetcherError, Result};
use crate::interfaces::relay::RelayService;
use crate::interfaces::transport::Transport;
use crate::services::transport::TorTransport;

const MESSAGES_PATH: &str = "v1/messages/";

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    fn header_value(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", BASE64.encode(raw))
    }
}

enum RelayClientMode {
    Reqwest(reqwest::Client),
    Tunnel {
        transport: Box<dyn Transport>,
        host: String,
        port: u16,
        base_path: String,
    },
}

/// `RelayService` over the relay's REST API.
pub struct HttpRelayService {
    base_url: String,
    credentials: Option<Credentials>,
    timeout: Duration,
    mode: RelayClientMode,
}

impl HttpRelayService {
    pub async fn new(config: &RelayConfig) -> Result<Self> {
        let base_url = config.base_url()?.to_string();
        let credentials = credentials_from(config);
        let timeout = Duration::from_secs(config.timeout_seconds());
        let parsed = ParsedBase::from_url(&base_url);

        let tunnel = match config.transport {
            TransportMode::Auto => parsed.is_onion,
            TransportMode::Tor => true,
            TransportMode::Direct => false,
        };
        if tunnel {
            let transport = TorTransport::new().await?;
            return Self::with_transport(base_url, credentials, timeout, Box::new(transport));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds()))
            .timeout(timeout)
            .build()
            .map_err(|e| RelayFetcherError::Runtime(e.to_string()))?;
        Ok(Self {
            base_url,
            credentials,
            timeout,
            mode: RelayClientMode::Reqwest(client),
        })
    }

    /// Speak HTTP/1.1 over streams opened by `transport` instead of reqwest.
    pub fn with_transport(
        base_url: String,
        credentials: Option<Credentials>,
        timeout: Duration,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        let parsed = ParsedBase::from_url(&base_url);
        if parsed.is_tls {
            return Err(RelayFetcherError::Config(
                "tunnelled relay connections require an http:// base_url".to_string(),
            ));
        }
        Ok(Self {
            base_url,
            credentials,
            timeout,
            mode: RelayClientMode::Tunnel {
                transport,
                host: parsed.host,
                port: parsed.port,
                base_path: parsed.base_path,
            },
        })
    }

    async fn send(&self, method: Method, path: &str) -> Result<(StatusCode, Bytes)> {
        match &self.mode {
            RelayClientMode::Reqwest(client) => {
                let url = join_url(&self.base_url, path);
                let mut request = client.request(method, url);
                if let Some(credentials) = &self.credentials {
                    request =
                        request.basic_auth(&credentials.username, Some(&credentials.password));
                }
                let response = request
                    .send()
                    .await
                    .map_err(|e: reqwest::Error| RelayFetcherError::Http(e.to_string()))?;
                let status = response.status();
                let body = response
                    .bytes()
                    .await
                    .map_err(|e: reqwest::Error| RelayFetcherError::Http(e.to_string()))?;
                Ok((status, body))
            }
            RelayClientMode::Tunnel {
                transport,
                host,
                port,
                base_path,
            } => {
                let exchange =
                    self.send_tunnelled(transport.as_ref(), host, *port, base_path, method, path);
                tokio::time::timeout(self.timeout, exchange)
                    .await
                    .map_err(|_| {
                        RelayFetcherError::Http(format!(
                            "relay request timed out after {}s",
                            self.timeout.as_secs()
                        ))
                    })?
            }
        }
    }

    async fn send_tunnelled(
        &self,
        transport: &dyn Transport,
        host: &str,
        port: u16,
        base_path: &str,
        method: Method,
        path: &str,
    ) -> Result<(StatusCode, Bytes)> {
        let mut builder = Request::builder()
            .method(method)
            .uri(join_path(base_path, path))
            .header(HOST, host_header(host, port));
        if let Some(credentials) = &self.credentials {
            builder = builder.header(AUTHORIZATION, credentials.header_value());
        }
        let req = builder
            .body(Empty::<Bytes>::new())
            .map_err(|e| RelayFetcherError::Runtime(e.to_string()))?;

        debug!(transport = transport.label(), host, port, "opening tunnelled relay connection");
        let stream = transport.connect(host, port).await?;
        let io = TokioIo::new(stream);
        let (mut sender, conn) = http1::handshake::<_, Empty<Bytes>>(io)
            .await
            .map_err(|e: hyper::Error| RelayFetcherError::Http(e.to_string()))?;
        tokio::spawn(async move {
            let _ = conn.await;
        });
        let response = sender
            .send_request(req)
            .await
            .map_err(|e: hyper::Error| RelayFetcherError::Http(e.to_string()))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e: hyper::Error| RelayFetcherError::Http(e.to_string()))?
            .to_bytes();
        Ok((status, body))
    }
}

#[async_trait]
impl RelayService for HttpRelayService {
    async fn fetch_messages(&self) -> Result<Option<Value>> {
        let (status, body) = self.send(Method::GET, MESSAGES_PATH).await?;
        if !status.is_success() {
            return Err(RelayFetcherError::Http(format!(
                "fetching messages failed with status {status}"
            )));
        }
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let value = serde_json::from_slice(&body)
            .map_err(|e| RelayFetcherError::Serialization(e.to_string()))?;
        Ok(Some(value))
    }

    async fn acknowledge(&self, source: &str, timestamp: u64) -> Result<()> {
        let path = format!(
            "{MESSAGES_PATH}{}/{timestamp}",
            urlencoding::encode(source)
        );
        let (status, _) = self.send(Method::DELETE, &path).await?;
        if !status.is_success() {
            return Err(RelayFetcherError::Http(format!(
                "acknowledging message failed with status {status}"
            )));
        }
        Ok(())
    }
}

fn credentials_from(config: &RelayConfig) -> Option<Credentials> {
    let username = config.username.as_ref()?.trim();
    if username.is_empty() {
        return None;
    }
    Some(Credentials {
        username: username.to_string(),
        password: config.password.clone().unwrap_or_default(),
    })
}

struct ParsedBase {
    host: String,
    port: u16,
    base_path: String,
    is_onion: bool,
    is_tls: bool,
}

impl ParsedBase {
    fn from_url(url: &str) -> Self {
        let trimmed = url.trim();
        let (without_scheme, is_tls) = match trimmed.strip_prefix("https://") {
            Some(rest) => (rest, true),
            None => (trimmed.strip_prefix("http://").unwrap_or(trimmed), false),
        };
        let mut parts = without_scheme.splitn(2, '/');
        let host_port = parts.next().unwrap_or_default();
        let base_path = parts
            .next()
            .map(|rest| format!("/{}", rest.trim_end_matches('/')))
            .unwrap_or_default();
        let mut host_parts = host_port.splitn(2, ':');
        let host = host_parts.next().unwrap_or_default().to_string();
        let default_port = if is_tls { 443 } else { 80 };
        let port = host_parts
            .next()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(default_port);
        let is_onion = host.ends_with(".onion");
        Self {
            host,
            port,
            base_path,
            is_onion,
            is_tls,
        }
    }
}

/// `Host` value for a plain HTTP request; the port is named unless it is 80.
fn host_header(host: &str, port: u16) -> String {
    if port == 80 {
        host.to_string()
    } else {
        format!("{host}:{port}")
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn join_path(base_path: &str, path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

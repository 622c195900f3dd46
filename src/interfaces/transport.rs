use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

pub trait AsyncReadWrite: AsyncRead + AsyncWrite {}

impl<T> AsyncReadWrite for T where T: AsyncRead + AsyncWrite {}

/// A connected byte stream the tunnelled relay client writes HTTP/1.1 onto.
pub type RelayStream = Box<dyn AsyncReadWrite + Unpin + Send>;

/// Dialer for relay hosts that reqwest cannot reach directly, such as onion
/// services.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in log fields and error messages.
    fn label(&self) -> &str;

    /// Open a stream to `host:port`. Failures are `Http` errors naming the
    /// relay address.
    async fn connect(&self, host: &str, port: u16) -> Result<RelayStream>;
}

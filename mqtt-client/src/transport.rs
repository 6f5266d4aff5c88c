use tokio::io::{AsyncWrite, AsyncWriteExt};

use mqtt_core::err::client::ClientError;
use mqtt_core::v3::DisconnectPacket;

/// Writes a `Disconnect` frame before the transport is torn down.
///
/// Blanket-implemented over any `AsyncWrite` half, so it covers plain `TcpStream`,
/// `tokio_rustls::client::TlsStream<TcpStream>`, and the `WriteHalf` of either once the stream
/// has been split for the receive/dispatch tasks.
pub trait Disconnect {
    #[allow(async_fn_in_trait)]
    async fn disconnect(&mut self) -> Result<(), ClientError>;
}

impl<W: AsyncWrite + Unpin> Disconnect for W {
    async fn disconnect(&mut self) -> Result<(), ClientError> {
        self.write_all(&DisconnectPacket::new().encode()).await?;
        self.flush().await?;
        return Ok(());
    }
}

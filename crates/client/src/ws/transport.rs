//! Transport seam: opens a duplex pipe of text frames to a URL.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

/// Error type for transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connection closed: {0}")]
    Closed(String),
}

/// Outgoing half: accepts serialized frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Incoming half: yields text frames until the connection ends.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Something that can open a connection to the backend.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a connection.
    ///
    /// # Errors
    ///
    /// * Returns [`TransportError`] if the handshake fails
    async fn connect(&self, url: &Url) -> Result<(FrameSink, FrameStream), TransportError>;
}

/// Debug implementation for trait objects implementing `Connector`.
impl std::fmt::Debug for dyn Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{Connector}}")
    }
}

/// WebSocket connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<(FrameSink, FrameStream), TransportError> {
        let (ws_stream, _response) = connect_async(url.as_str()).await?;
        let (write, read) = ws_stream.split();

        let sink: FrameSink = Box::pin(
            write
                .sink_map_err(TransportError::from)
                .with(|text: String| future::ready(Ok::<_, TransportError>(Message::text(text)))),
        );

        let stream: FrameStream = Box::pin(read.filter_map(|msg_result| {
            future::ready(match msg_result {
                Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    crate::log_debug!("WebSocket received close frame: {:?}", frame);
                    None
                }
                // Pong is handled automatically by tungstenite
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::from(e))),
            })
        }));

        Ok((sink, stream))
    }
}

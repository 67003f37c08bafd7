//! In-memory connector for driving the socket layer in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chatlink_shared::{ChannelFrame, EVENT_REPLY};
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use super::transport::{Connector, FrameSink, FrameStream, TransportError};

const WAIT: Duration = Duration::from_secs(2);

type ConnectResult = Result<(FrameSink, FrameStream), TransportError>;

/// Hands every connect attempt to the test as a [`PendingConnect`].
pub(crate) struct MockConnector {
    attempts: mpsc::UnboundedSender<PendingConnect>,
}

impl MockConnector {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PendingConnect>) {
        let (attempts, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { attempts }), rx)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> ConnectResult {
        let (respond, outcome) = oneshot::channel();
        self.attempts
            .send(PendingConnect {
                url: url.clone(),
                respond,
            })
            .map_err(|_| TransportError::Closed("test harness gone".to_string()))?;
        outcome
            .await
            .unwrap_or_else(|_| Err(TransportError::Closed("attempt abandoned".to_string())))
    }
}

/// A connect attempt waiting for the test to decide its outcome.
pub(crate) struct PendingConnect {
    pub url: Url,
    respond: oneshot::Sender<ConnectResult>,
}

impl PendingConnect {
    /// Complete the handshake and return the server side of the pipe.
    pub(crate) fn accept(self) -> MockServer {
        let (client_tx, from_client) = unbounded::<String>();
        let (to_client, client_rx) = unbounded::<Result<String, TransportError>>();

        let sink: FrameSink =
            Box::pin(client_tx.sink_map_err(|e| TransportError::Closed(e.to_string())));
        let stream: FrameStream = Box::pin(client_rx);
        let _ = self.respond.send(Ok((sink, stream)));

        MockServer {
            from_client,
            to_client,
        }
    }

    pub(crate) fn reject(self) {
        let _ = self
            .respond
            .send(Err(TransportError::Closed("connection refused".to_string())));
    }
}

/// Server end of an accepted connection.
pub(crate) struct MockServer {
    from_client: UnboundedReceiver<String>,
    to_client: UnboundedSender<Result<String, TransportError>>,
}

impl MockServer {
    /// Next non-heartbeat frame from the client.
    pub(crate) async fn recv_frame(&mut self) -> ChannelFrame {
        loop {
            let text = tokio::time::timeout(WAIT, self.from_client.next())
                .await
                .expect("no frame from client")
                .expect("client closed");
            let frame = ChannelFrame::parse(&text).expect("client sent a bad frame");
            if frame.topic != chatlink_shared::SOCKET_TOPIC {
                return frame;
            }
        }
    }

    /// Next heartbeat from the client, skipping channel frames.
    pub(crate) async fn recv_heartbeat(&mut self) -> ChannelFrame {
        loop {
            let text = tokio::time::timeout(WAIT, self.from_client.next())
                .await
                .expect("no heartbeat from client")
                .expect("client closed");
            let frame = ChannelFrame::parse(&text).expect("client sent a bad frame");
            if frame.topic == chatlink_shared::SOCKET_TOPIC {
                return frame;
            }
        }
    }

    /// A frame that was already sent, if any.
    pub(crate) fn try_recv_frame(&mut self) -> Option<ChannelFrame> {
        match self.from_client.try_next() {
            Ok(Some(text)) => ChannelFrame::parse(&text).ok(),
            _ => None,
        }
    }

    /// Wait until the client drops its side.
    pub(crate) async fn wait_closed(&mut self) {
        tokio::time::timeout(WAIT, async {
            while self.from_client.next().await.is_some() {}
        })
        .await
        .expect("client did not close");
    }

    pub(crate) fn send_frame(&self, frame: ChannelFrame) {
        self.send_raw(&frame.to_text().expect("serializable frame"));
    }

    pub(crate) fn send_raw(&self, text: &str) {
        self.to_client
            .unbounded_send(Ok(text.to_string()))
            .expect("client stream gone");
    }

    pub(crate) fn reply(&self, request: &ChannelFrame, status: &str) {
        let mut frame = ChannelFrame::new(
            request.topic.clone(),
            EVENT_REPLY,
            json!({"status": status, "response": {}}),
        );
        frame.reference = request.reference.clone();
        self.send_frame(frame);
    }

    pub(crate) fn reply_ok(&self, request: &ChannelFrame) {
        self.reply(request, "ok");
    }

    /// End the connection from the server side.
    pub(crate) fn drop_connection(self) {
        drop(self);
    }
}

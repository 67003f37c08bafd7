//! Session task: drives one open transport until it ends.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use chatlink_shared::{ChannelFrame, SOCKET_TOPIC};
use futures_channel::mpsc::UnboundedReceiver;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use url::Url;

use super::{next_ref, redacted, ConnectionEvent, ConnectionId};
use crate::ws::transport::{Connector, FrameSink, TransportError};

const MIN_HEARTBEAT: Duration = Duration::from_millis(10);

pub(super) struct SessionParams {
    pub id: ConnectionId,
    pub url: Url,
    pub connector: Arc<dyn Connector>,
    pub heartbeat_interval: Duration,
    pub refs: Arc<AtomicU64>,
}

pub(super) async fn run_session(
    params: SessionParams,
    mut outbound: UnboundedReceiver<ChannelFrame>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let SessionParams {
        id,
        url,
        connector,
        heartbeat_interval,
        refs,
    } = params;

    let (mut sink, mut stream) = match connector.connect(&url).await {
        Ok(pair) => pair,
        Err(e) => {
            crate::log_error!("{}: connect to {} failed: {}", id, redacted(&url), e);
            let _ = events.send(ConnectionEvent::Closed { id, error: Some(e) });
            return;
        }
    };

    crate::log_info!("{}: connected to {}", id, redacted(&url));
    if events.send(ConnectionEvent::Opened { id }).is_err() {
        return;
    }

    let period = heartbeat_interval.max(MIN_HEARTBEAT);
    let mut heartbeat = interval_at(Instant::now() + period, period);
    let mut pending_heartbeat: Option<String> = None;

    let error = loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(text)) => {
                    let frame = match ChannelFrame::parse(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            crate::log_warn!("{}: dropping unparseable frame: {}", id, e);
                            continue;
                        }
                    };
                    if frame.topic == SOCKET_TOPIC {
                        if frame.reference.is_some() && frame.reference == pending_heartbeat {
                            pending_heartbeat = None;
                        }
                        continue;
                    }
                    if events.send(ConnectionEvent::Frame { id, frame }).is_err() {
                        // owner is gone
                        return;
                    }
                }
                Some(Err(e)) => {
                    crate::log_error!("{}: read error: {}", id, e);
                    break Some(e);
                }
                None => {
                    crate::log_info!("{}: closed by server", id);
                    break None;
                }
            },
            frame = outbound.next() => match frame {
                Some(frame) => {
                    if let Err(e) = send_frame(&mut sink, &frame).await {
                        break Some(e);
                    }
                }
                None => {
                    // Connection handle dropped its sender
                    let _ = sink.close().await;
                    return;
                }
            },
            _ = heartbeat.tick() => {
                if let Some(missed) = pending_heartbeat.take() {
                    crate::log_warn!("{}: heartbeat {} unanswered, closing", id, missed);
                    let _ = sink.close().await;
                    break Some(TransportError::Closed("heartbeat timeout".to_string()));
                }
                let reference = next_ref(&refs);
                let frame = ChannelFrame::heartbeat(&reference);
                if let Err(e) = send_frame(&mut sink, &frame).await {
                    break Some(e);
                }
                pending_heartbeat = Some(reference);
            }
        }
    };

    let _ = events.send(ConnectionEvent::Closed { id, error });
}

async fn send_frame(sink: &mut FrameSink, frame: &ChannelFrame) -> Result<(), TransportError> {
    let text = match frame.to_text() {
        Ok(text) => text,
        Err(e) => {
            crate::log_error!("Serialize failed: {}", e);
            return Ok(());
        }
    };
    crate::log_trace!("Sending {} on {}", frame.event, frame.topic);
    sink.send(text).await.map_err(|e| {
        crate::log_error!("Send failed: {}", e);
        e
    })
}

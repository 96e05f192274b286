//! The two duplex-channel back-ends Transport can sit on top of: a real
//! WebSocket connection, or an in-memory virtual channel used by the
//! CDP-mapped path and by tests.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::TransportError;

/// Direction of a raw frame, for the `on_raw_message` tracing hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// The write half of a duplex channel, abstracted over transport kind.
#[async_trait]
pub trait OutboundSink: Send + Sync {
    async fn send_text(&self, payload: String) -> Result<(), TransportError>;
    async fn close(&self) -> Result<(), TransportError>;
}

/// A constructed channel: something to write frames to, and a stream of
/// frames read from the other side.
pub struct ChannelHalves {
    pub outbound: Box<dyn OutboundSink>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

struct WsOutbound {
    sink: AsyncMutex<
        futures_util::stream::SplitSink<
            tokio_tungstenite::WebSocketStream<
                tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
            >,
            WsMessage,
        >,
    >,
}

#[async_trait]
impl OutboundSink for WsOutbound {
    async fn send_text(&self, payload: String) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.send(WsMessage::Text(payload.into()))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        let _ = sink.close().await;
        Ok(())
    }
}

/// Connects a real duplex byte channel over WebSocket and spawns the reader
/// task that forwards text frames into the returned inbound receiver.
pub async fn ws_channel(url: &str) -> Result<ChannelHalves, TransportError> {
    let (stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|_| TransportError::ConnectionClosed)?;
    let (sink, mut read) = stream.split();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => {
                    if tx.send(text.to_string()).is_err() {
                        break;
                    }
                }
                Ok(WsMessage::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    });

    Ok(ChannelHalves {
        outbound: Box::new(WsOutbound {
            sink: AsyncMutex::new(sink),
        }),
        inbound: rx,
    })
}

struct VirtualOutbound {
    callback: Arc<dyn Fn(String) + Send + Sync>,
}

#[async_trait]
impl OutboundSink for VirtualOutbound {
    async fn send_text(&self, payload: String) -> Result<(), TransportError> {
        (self.callback)(payload);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Feeds inbound frames into a virtual channel's receiver, the other half of
/// [`virtual_channel`]. Used by `CdpBidiMapper` to hand translated BiDi
/// frames to Transport, and by tests to simulate a browser.
#[derive(Clone)]
pub struct VirtualInboundFeed {
    sender: mpsc::UnboundedSender<String>,
}

impl VirtualInboundFeed {
    pub fn push(&self, payload: impl Into<String>) -> Result<(), TransportError> {
        self.sender
            .send(payload.into())
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

/// An in-memory duplex channel: outbound frames go to a send callback,
/// inbound frames arrive through the returned [`VirtualInboundFeed`].
pub fn virtual_channel(
    on_send: impl Fn(String) + Send + Sync + 'static,
) -> (ChannelHalves, VirtualInboundFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    let halves = ChannelHalves {
        outbound: Box::new(VirtualOutbound {
            callback: Arc::new(on_send),
        }),
        inbound: rx,
    };
    (halves, VirtualInboundFeed { sender: tx })
}

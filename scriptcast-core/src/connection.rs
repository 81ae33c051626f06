//! Managed TCP connection carrying [`Frame`]s.
//!
//! Wraps a `TcpStream` in a [`Framed`] codec, splits it, and bridges
//! both halves to the owning task through bounded mpsc channels. The
//! writer half is reachable through clonable [`ConnectionSender`]
//! handles so a background producer (the batch flusher) can share the
//! outbound path with the session without locking. Reader or writer
//! failure tears down only this connection, never the process.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::codec::FrameCodec;
use crate::error::CastError;
use crate::frame::Frame;

/// Clonable handle for queueing outbound frames.
pub type ConnectionSender = mpsc::Sender<Frame>;

/// Depth of the outbound/inbound frame queues.
const CHANNEL_DEPTH: usize = 100;

/// A frame-oriented connection to a single peer.
#[derive(Debug)]
pub struct Connection {
    tx: ConnectionSender,
    rx: mpsc::Receiver<Frame>,
}

impl Connection {
    /// Take ownership of an accepted or connected stream.
    pub fn new(stream: TcpStream) -> Self {
        let (mut net_writer, mut net_reader) = Framed::new(stream, FrameCodec).split();

        // User -> Network
        let (user_tx, mut network_rx) = mpsc::channel::<Frame>(CHANNEL_DEPTH);

        // Network -> User
        let (network_tx, user_rx) = mpsc::channel::<Frame>(CHANNEL_DEPTH);

        // Writer task: drains the outbound queue into the socket.
        tokio::spawn(async move {
            while let Some(frame) = network_rx.recv().await {
                if let Err(e) = net_writer.send(frame).await {
                    debug!("network write error: {e}");
                    break;
                }
            }
            // Queue closed: flush whatever the codec buffered.
            let _ = net_writer.flush().await;
        });

        // Reader task: feeds decoded frames to the owning task.
        tokio::spawn(async move {
            while let Some(result) = net_reader.next().await {
                match result {
                    Ok(frame) => {
                        if network_tx.send(frame).await.is_err() {
                            // Receiver dropped, stop reading.
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("network read error: {e}");
                        break;
                    }
                }
            }
        });

        Self {
            tx: user_tx,
            rx: user_rx,
        }
    }

    /// Connect to `addr` (`host:port`).
    pub async fn connect(addr: &str) -> Result<Self, CastError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    /// Queue a frame for transmission.
    pub async fn send(&self, frame: Frame) -> Result<(), CastError> {
        self.tx.send(frame).await.map_err(|_| CastError::ChannelClosed)
    }

    /// Receive the next frame. `None` means the peer closed the
    /// connection (or the read half failed).
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// A clonable outbound handle sharing this connection's writer.
    pub fn sender(&self) -> ConnectionSender {
        self.tx.clone()
    }

    /// Close the connection. Dropping the handles ends the writer
    /// task, which flushes pending frames before the socket closes.
    pub fn close(self) {}
}

// ── ConnectionInfo ───────────────────────────────────────────────

/// Host/port pair for dialing a peer.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    host: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl std::fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ── Tests ────────────────────────────────────────────────────────

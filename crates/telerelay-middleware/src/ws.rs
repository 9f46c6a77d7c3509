//! WebSocket transport between processes.
//!
//! The publishing side binds a listener and fans every frame out to all
//! connected clients as one text message `"<topic> <payload>"`.  The
//! subscribing side connects to a publisher, keeps only frames on its topic,
//! and reconnects with a fixed backoff whenever the connection drops.
//!
//! A master process owns one [`WsFramePublisher`] (for `follower_commands`)
//! and one [`WsFrameSubscriber`] (connected to the leader's publisher for
//! `leader_joints`).

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use telerelay_types::RelayError;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::frame::Frame;
use crate::transport::{FramePublisher, FrameSubscriber};

/// Frames buffered per connected client before the oldest are dropped.
const CLIENT_BUFFER: usize = 256;

/// Frames buffered on the subscribing side before new ones are dropped.
const SUBSCRIBER_BUFFER: usize = 256;

/// Delay between reconnect attempts of a [`WsFrameSubscriber`].
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_millis(500);

// ────────────────────────────────────────────────────────────────────────────
// Publisher
// ────────────────────────────────────────────────────────────────────────────

/// Publishing end: a WebSocket server that broadcasts frames to every client.
///
/// Dropping it stops accepting new clients.
pub struct WsFramePublisher {
    local_addr: SocketAddr,
    tx: broadcast::Sender<String>,
    accept_task: JoinHandle<()>,
}

impl WsFramePublisher {
    /// Bind a listener on `addr` and start accepting clients.
    ///
    /// Pass port `0` to let the OS pick a free port; see
    /// [`local_addr`](Self::local_addr).
    ///
    /// # Errors
    ///
    /// [`RelayError::Transport`] if the TCP listener cannot be bound.
    pub async fn bind(addr: SocketAddr) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayError::Transport(format!("ws bind error on {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| RelayError::Io(e.to_string()))?;
        let (tx, _) = broadcast::channel(CLIENT_BUFFER);

        let accept_tx = tx.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let rx = accept_tx.subscribe();
                        tokio::spawn(async move {
                            if let Err(e) = serve_client(stream, peer, rx).await {
                                warn!(peer = %peer, error = %e, "ws client error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "ws accept error");
                    }
                }
            }
        });

        info!(addr = %local_addr, "ws publisher listening");
        Ok(Self {
            local_addr,
            tx,
            accept_task,
        })
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Drop for WsFramePublisher {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

#[async_trait]
impl FramePublisher for WsFramePublisher {
    async fn publish(&self, frame: Frame) -> Result<usize, RelayError> {
        // No connected clients is not an error: the frame is simply dropped.
        Ok(self.tx.send(frame.encode()).unwrap_or(0))
    }
}

async fn serve_client(
    stream: TcpStream,
    peer: SocketAddr,
    mut rx: broadcast::Receiver<String>,
) -> Result<(), RelayError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| RelayError::Transport(format!("ws handshake from {peer}: {e}")))?;
    debug!(peer = %peer, "ws client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(text) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(peer = %peer, lagged_by = n, "ws client lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Clients are receive-only.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    debug!(peer = %peer, "ws client disconnected");
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Subscriber
// ────────────────────────────────────────────────────────────────────────────

/// Subscribing end: a WebSocket client filtered to one topic.
///
/// The connection is driven by a background task that reconnects after any
/// failure.  Frames that arrive while the local buffer is full are dropped.
pub struct WsFrameSubscriber {
    topic: String,
    rx: mpsc::Receiver<Frame>,
    task: JoinHandle<()>,
}

impl WsFrameSubscriber {
    /// Connect to the publisher at `url` (e.g. `ws://127.0.0.1:5555`) and
    /// yield frames on `topic`.
    ///
    /// Returns immediately; an unreachable publisher is retried every
    /// [`DEFAULT_RECONNECT_BACKOFF`].
    pub fn connect(url: impl Into<String>, topic: impl Into<String>) -> Self {
        Self::connect_with_backoff(url, topic, DEFAULT_RECONNECT_BACKOFF)
    }

    /// As [`connect`](Self::connect) with an explicit reconnect backoff.
    pub fn connect_with_backoff(
        url: impl Into<String>,
        topic: impl Into<String>,
        backoff: Duration,
    ) -> Self {
        let url = url.into();
        let topic = topic.into();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let task = tokio::spawn(run_subscriber(url, topic.clone(), tx, backoff));
        Self { topic, rx, task }
    }
}

impl Drop for WsFrameSubscriber {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl FrameSubscriber for WsFrameSubscriber {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }
}

async fn run_subscriber(url: String, topic: String, tx: mpsc::Sender<Frame>, backoff: Duration) {
    loop {
        match connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => {
                info!(url = %url, topic = %topic, "ws subscriber connected");
                let (_, mut read) = ws_stream.split();
                while let Some(msg) = read.next().await {
                    match msg {
                        Ok(Message::Text(text)) => {
                            let Some(frame) = Frame::decode_for(&topic, text.as_str()) else {
                                continue;
                            };
                            match tx.try_send(frame) {
                                Ok(()) => {}
                                Err(mpsc::error::TrySendError::Full(_)) => {
                                    debug!(topic = %topic, "subscriber buffer full, frame dropped");
                                }
                                Err(mpsc::error::TrySendError::Closed(_)) => return,
                            }
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!(url = %url, error = %e, "ws subscriber read error");
                            break;
                        }
                    }
                }
                warn!(url = %url, "ws subscriber disconnected, reconnecting");
            }
            Err(e) => {
                debug!(url = %url, error = %e, "ws connect failed");
            }
        }

        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(backoff).await;
    }
}

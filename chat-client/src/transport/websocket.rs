//! WebSocket transport built on tokio-tungstenite.
//!
//! The socket is split into a sink and a stream, each behind its own lock,
//! so a send never waits for the read loop parked in `recv()`.

use super::{Transport, TransportError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production transport: one WebSocket carrying JSON text frames.
#[derive(Default)]
pub struct WsTransport {
    sink: Mutex<Option<SplitSink<WsStream, Message>>>,
    stream: Mutex<Option<SplitStream<WsStream>>>,
    connected: AtomicBool,
    connect_timeout: Option<Duration>,
}

impl WsTransport {
    /// Create a transport with no connect timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: abort connection attempts that take longer than `timeout`.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn mark_closed(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Close and drop the sink half, answering a pending close handshake.
    async fn release_sink(&self) {
        self.mark_closed();
        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                tracing::debug!("Closing dead socket: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("connected", &self.is_connected())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &str) -> Result<(), TransportError> {
        let handshake = connect_async(url);
        let result = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, handshake)
                .await
                .map_err(|_| TransportError::Timeout)?,
            None => handshake.await,
        };
        let (socket, _response) =
            result.map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (sink, stream) = socket.split();
        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!("WebSocket open: {}", url);
        Ok(())
    }

    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;

        if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
            self.mark_closed();
            return Err(TransportError::SendFailed(e.to_string()));
        }
        Ok(())
    }

    async fn recv(&self) -> Result<String, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;

        let error = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => return Ok(text),
                    Err(_) => tracing::warn!("Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("Server closed the socket: {:?}", frame);
                    break TransportError::ConnectionClosed;
                }
                // Ping/pong are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => break TransportError::ReceiveFailed(e.to_string()),
                None => break TransportError::ConnectionClosed,
            }
        };

        // The socket is dead: drop both halves now so it is gone before any reconnect
        *guard = None;
        drop(guard);
        self.release_sink().await;
        Err(error)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.mark_closed();
        let sink = self.sink.lock().await.take();
        let result = match sink {
            Some(mut sink) => sink
                .close()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string())),
            None => Ok(()),
        };
        *self.stream.lock().await = None;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_before_connect_fails() {
        let transport = WsTransport::new();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send("{}").await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.recv().await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn close_without_socket_is_ok() {
        let transport = WsTransport::new();
        assert!(transport.close().await.is_ok());
    }

    #[tokio::test]
    async fn invalid_url_fails_to_connect() {
        let transport = WsTransport::new().with_connect_timeout(Duration::from_secs(2));
        let result = transport.connect("not a url").await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn server_close_releases_the_socket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(tcp).await.unwrap();
            socket.send(Message::Close(None)).await.unwrap();
            // Completes once the client answers the close or drops the TCP stream
            tokio::time::timeout(Duration::from_secs(2), socket.next())
                .await
                .is_ok()
        });

        let transport = WsTransport::new();
        transport.connect(&url).await.unwrap();
        assert!(matches!(
            transport.recv().await,
            Err(TransportError::ConnectionClosed)
        ));

        assert!(server.await.unwrap(), "old socket was left open");
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send("{}").await,
            Err(TransportError::NotConnected)
        ));
    }
}

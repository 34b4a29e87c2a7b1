//! Mock transport for testing.
//!
//! Allows pushing inbound frames, dropping the socket and capturing sent
//! frames for verification.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Mock transport for testing.
///
/// Clones share state, so a test keeps one handle while the client owns
/// another.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    wake: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_url: Option<String>,
    connect_count: usize,
    lifecycle: Vec<&'static str>,
    sent_frames: Vec<String>,
    receive_queue: VecDeque<String>,
    failing_connects: Vec<String>,
    fail_next_send: Option<String>,
    fail_next_recv: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an inbound frame for `recv()`.
    pub fn push_frame(&self, frame: impl Into<String>) {
        self.lock().receive_queue.push_back(frame.into());
        self.wake.notify_waiters();
    }

    /// Simulate the server dropping the socket.
    pub fn drop_connection(&self) {
        self.lock().connected = false;
        self.wake.notify_waiters();
    }

    /// Get all frames that were sent.
    pub fn sent_frames(&self) -> Vec<String> {
        self.lock().sent_frames.clone()
    }

    /// Get the last frame that was sent.
    pub fn last_sent(&self) -> Option<String> {
        self.lock().sent_frames.last().cloned()
    }

    /// Get the URL that was connected to.
    pub fn connected_url(&self) -> Option<String> {
        self.lock().connected_url.clone()
    }

    /// Number of `connect()` calls so far, failed ones included.
    pub fn connect_count(&self) -> usize {
        self.lock().connect_count
    }

    /// Order of `connect()` and `close()` calls, as `"connect"` / `"close"`.
    pub fn lifecycle(&self) -> Vec<&'static str> {
        self.lock().lifecycle.clone()
    }

    /// Cause the next connect() to fail with the given error.
    ///
    /// Calls accumulate: each queued error fails one attempt.
    pub fn fail_next_connect(&self, error: &str) {
        self.lock().failing_connects.push(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }

    /// Cause the next recv() to fail with the given error.
    pub fn fail_next_recv(&self, error: &str) {
        self.lock().fail_next_recv = Some(error.to_string());
        self.wake.notify_waiters();
    }

    /// Clear all state (frames, queue, connection).
    pub fn reset(&self) {
        *self.lock() = MockTransportInner::default();
        self.wake.notify_waiters();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            wake: Arc::clone(&self.wake),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();
        inner.connect_count += 1;
        inner.lifecycle.push("connect");

        // Check for forced failure
        if !inner.failing_connects.is_empty() {
            let error = inner.failing_connects.remove(0);
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connected = true;
        inner.connected_url = Some(url.to_string());
        Ok(())
    }

    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_frames.push(frame.to_string());
        Ok(())
    }

    async fn recv(&self) -> Result<String, TransportError> {
        loop {
            // Registered before checking so a push in between is not missed
            let woken = self.wake.notified();
            {
                let mut inner = self.lock();

                if !inner.connected {
                    return Err(TransportError::ConnectionClosed);
                }

                // Check for forced failure
                if let Some(error) = inner.fail_next_recv.take() {
                    return Err(TransportError::ReceiveFailed(error));
                }

                if let Some(frame) = inner.receive_queue.pop_front() {
                    return Ok(frame);
                }
            }
            woken.await;
        }
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut inner = self.lock();
        inner.connected = false;
        inner.lifecycle.push("close");
        drop(inner);
        self.wake.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // ===========================================
    // MockTransport Basic Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_connects() {
        let transport = MockTransport::new();
        assert!(!transport.is_connected());

        transport.connect("ws://test/ws").await.unwrap();

        assert!(transport.is_connected());
        assert_eq!(transport.connected_url(), Some("ws://test/ws".to_string()));
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn mock_transport_sends_frames() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        transport.send("frame 1").await.unwrap();
        transport.send("frame 2").await.unwrap();

        assert_eq!(transport.sent_frames(), vec!["frame 1", "frame 2"]);
        assert_eq!(transport.last_sent().as_deref(), Some("frame 2"));
    }

    #[tokio::test]
    async fn mock_transport_receives_queued_frames() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        transport.push_frame("one");
        transport.push_frame("two");

        assert_eq!(transport.recv().await.unwrap(), "one");
        assert_eq!(transport.recv().await.unwrap(), "two");
    }

    #[tokio::test]
    async fn recv_waits_for_pushed_frame() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        let pusher = transport.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            pusher.push_frame("late");
        });

        let frame = tokio::time::timeout(Duration::from_secs(2), transport.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, "late");
    }

    #[tokio::test]
    async fn drop_connection_wakes_recv() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        let dropper = transport.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            dropper.drop_connection();
        });

        let result = tokio::time::timeout(Duration::from_secs(2), transport.recv())
            .await
            .unwrap();
        assert!(matches!(result, Err(TransportError::ConnectionClosed)));
    }

    // ===========================================
    // Error Condition Tests
    // ===========================================

    #[tokio::test]
    async fn send_without_connect_fails() {
        let transport = MockTransport::new();

        let result = transport.send("data").await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn recv_without_connect_is_closed() {
        let transport = MockTransport::new();

        let result = transport.recv().await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn forced_connect_failures_accumulate() {
        let transport = MockTransport::new();
        transport.fail_next_connect("refused");
        transport.fail_next_connect("refused again");

        assert!(transport.connect("ws://test").await.is_err());
        assert!(transport.connect("ws://test").await.is_err());
        assert!(!transport.is_connected());

        transport.connect("ws://test").await.unwrap();
        assert_eq!(transport.connect_count(), 3);
    }

    #[tokio::test]
    async fn forced_send_failure() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        transport.fail_next_send("buffer full");

        let result = transport.send("data").await;
        assert!(matches!(result, Err(TransportError::SendFailed(_))));

        // Next send should work
        transport.send("data").await.unwrap();
    }

    #[tokio::test]
    async fn forced_recv_failure() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        transport.push_frame("data");
        transport.fail_next_recv("reset");

        let result = transport.recv().await;
        assert!(matches!(result, Err(TransportError::ReceiveFailed(_))));

        // Next recv should work (and get the queued frame)
        assert_eq!(transport.recv().await.unwrap(), "data");
    }

    // ===========================================
    // Clone and Shared State Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_clone_shares_state() {
        let transport1 = MockTransport::new();
        let transport2 = transport1.clone();

        transport1.connect("ws://test").await.unwrap();
        assert!(transport2.is_connected());

        transport1.send("from t1").await.unwrap();
        transport2.send("from t2").await.unwrap();

        assert_eq!(transport1.sent_frames().len(), 2);
    }

    #[tokio::test]
    async fn mock_transport_reset_clears_all() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        transport.send("data").await.unwrap();
        transport.push_frame("pending");

        transport.reset();

        assert!(!transport.is_connected());
        assert!(transport.sent_frames().is_empty());
        assert!(transport.connected_url().is_none());
    }
}

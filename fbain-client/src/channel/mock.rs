//! Mock channel for testing.
//!
//! Allows queueing host frames, scripting mid-conversation disconnects, and
//! capturing sent traffic for verification.

use super::{BlockChannel, ChannelError, Frame};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One scripted `recv()` outcome.
#[derive(Debug)]
enum QueuedRecv {
    /// Deliver a frame.
    Frame(Frame),
    /// Drop the connection, as an abrupt close mid-transfer would.
    Disconnect,
}

/// Mock channel for testing.
///
/// Clones share state, so a test can keep a handle for scripting and
/// verification while the driver owns another.
#[derive(Debug, Default)]
pub struct MockChannel {
    inner: Arc<Mutex<MockChannelInner>>,
}

#[derive(Debug, Default)]
struct MockChannelInner {
    connected: bool,
    connected_address: Option<String>,
    connect_count: u32,
    sent_frames: Vec<Frame>,
    receive_queue: VecDeque<QueuedRecv>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
}

impl MockChannel {
    /// Create a new mock channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON control frame for a later `recv()`.
    pub fn queue_text(&self, text: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .receive_queue
            .push_back(QueuedRecv::Frame(Frame::Text(text.into())));
    }

    /// Queue a binary ciphertext frame for a later `recv()`.
    pub fn queue_binary(&self, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .receive_queue
            .push_back(QueuedRecv::Frame(Frame::Binary(data)));
    }

    /// Script a connection drop at this point in the conversation.
    ///
    /// The matching `recv()` fails with `ConnectionClosed` and the channel
    /// reports disconnected until the next `connect()`.
    pub fn queue_disconnect(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.receive_queue.push_back(QueuedRecv::Disconnect);
    }

    /// Get all frames that were sent.
    pub fn sent_frames(&self) -> Vec<Frame> {
        let inner = self.inner.lock().unwrap();
        inner.sent_frames.clone()
    }

    /// Get only the binary frames that were sent.
    pub fn sent_binary(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner
            .sent_frames
            .iter()
            .filter_map(|f| match f {
                Frame::Binary(data) => Some(data.clone()),
                Frame::Text(_) => None,
            })
            .collect()
    }

    /// Get the last frame that was sent.
    pub fn last_sent(&self) -> Option<Frame> {
        let inner = self.inner.lock().unwrap();
        inner.sent_frames.last().cloned()
    }

    /// Get the address that was last connected to.
    pub fn connected_address(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.connected_address.clone()
    }

    /// Number of `connect()` calls that succeeded.
    pub fn connect_count(&self) -> u32 {
        let inner = self.inner.lock().unwrap();
        inner.connect_count
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }

    /// Clear all state (frames, queue, connection).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockChannelInner::default();
    }
}

impl Clone for MockChannel {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl BlockChannel for MockChannel {
    async fn connect(&self, address: &str) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_connect.take() {
            return Err(ChannelError::ConnectionFailed(error));
        }

        inner.connected = true;
        inner.connected_address = Some(address.to_string());
        inner.connect_count += 1;
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<(), ChannelError> {
        self.push_sent(Frame::Text(text.to_string()))
    }

    async fn send_binary(&self, data: &[u8]) -> Result<(), ChannelError> {
        self.push_sent(Frame::Binary(data.to_vec()))
    }

    async fn recv(&self) -> Result<Frame, ChannelError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(ChannelError::NotConnected);
        }

        match inner.receive_queue.pop_front() {
            Some(QueuedRecv::Frame(frame)) => Ok(frame),
            Some(QueuedRecv::Disconnect) => {
                inner.connected = false;
                Err(ChannelError::ConnectionClosed)
            }
            None => Err(ChannelError::ConnectionClosed),
        }
    }

    fn is_connected(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.connected
    }

    async fn close(&self) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        Ok(())
    }
}

impl MockChannel {
    fn push_sent(&self, frame: Frame) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(ChannelError::NotConnected);
        }

        if let Some(error) = inner.fail_next_send.take() {
            return Err(ChannelError::SendFailed(error));
        }

        inner.sent_frames.push(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===========================================
    // MockChannel Basic Tests
    // ===========================================

    #[tokio::test]
    async fn mock_channel_connects() {
        let channel = MockChannel::new();
        assert!(!channel.is_connected());

        channel.connect("session-token").await.unwrap();

        assert!(channel.is_connected());
        assert_eq!(
            channel.connected_address(),
            Some("session-token".to_string())
        );
        assert_eq!(channel.connect_count(), 1);
    }

    #[tokio::test]
    async fn mock_channel_captures_sent_frames() {
        let channel = MockChannel::new();
        channel.connect("addr").await.unwrap();

        channel.send_text("{\"read\":16}").await.unwrap();
        channel.send_binary(&[1, 2, 3]).await.unwrap();

        let sent = channel.sent_frames();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], Frame::Text("{\"read\":16}".into()));
        assert_eq!(sent[1], Frame::Binary(vec![1, 2, 3]));
        assert_eq!(channel.sent_binary(), vec![vec![1, 2, 3]]);
    }

    #[tokio::test]
    async fn mock_channel_delivers_queued_frames_in_order() {
        let channel = MockChannel::new();
        channel.connect("addr").await.unwrap();

        channel.queue_text("first");
        channel.queue_binary(vec![9]);

        assert_eq!(channel.recv().await.unwrap(), Frame::Text("first".into()));
        assert_eq!(channel.recv().await.unwrap(), Frame::Binary(vec![9]));
    }

    #[tokio::test]
    async fn empty_queue_reads_as_closed() {
        let channel = MockChannel::new();
        channel.connect("addr").await.unwrap();

        let result = channel.recv().await;
        assert!(matches!(result, Err(ChannelError::ConnectionClosed)));
    }

    // ===========================================
    // Scripted Failure Tests
    // ===========================================

    #[tokio::test]
    async fn scripted_disconnect_drops_the_connection() {
        let channel = MockChannel::new();
        channel.connect("addr").await.unwrap();

        channel.queue_text("before");
        channel.queue_disconnect();
        channel.queue_text("after reconnect");

        channel.recv().await.unwrap();
        let result = channel.recv().await;
        assert!(matches!(result, Err(ChannelError::ConnectionClosed)));
        assert!(!channel.is_connected());

        // Reconnecting resumes the scripted conversation.
        channel.connect("addr").await.unwrap();
        assert_eq!(
            channel.recv().await.unwrap(),
            Frame::Text("after reconnect".into())
        );
        assert_eq!(channel.connect_count(), 2);
    }

    #[tokio::test]
    async fn forced_connect_failure() {
        let channel = MockChannel::new();
        channel.fail_next_connect("network unreachable");

        let result = channel.connect("addr").await;
        assert!(matches!(result, Err(ChannelError::ConnectionFailed(_))));
        assert!(!channel.is_connected());

        // Next connect succeeds.
        channel.connect("addr").await.unwrap();
    }

    #[tokio::test]
    async fn forced_send_failure() {
        let channel = MockChannel::new();
        channel.connect("addr").await.unwrap();
        channel.fail_next_send("buffer full");

        let result = channel.send_binary(&[1]).await;
        assert!(matches!(result, Err(ChannelError::SendFailed(_))));

        channel.send_binary(&[1]).await.unwrap();
    }

    #[tokio::test]
    async fn operations_without_connect_fail() {
        let channel = MockChannel::new();

        assert!(matches!(
            channel.send_text("x").await,
            Err(ChannelError::NotConnected)
        ));
        assert!(matches!(
            channel.recv().await,
            Err(ChannelError::NotConnected)
        ));
    }

    // ===========================================
    // Clone and Shared State Tests
    // ===========================================

    #[tokio::test]
    async fn clones_share_state() {
        let channel = MockChannel::new();
        let other = channel.clone();

        channel.connect("addr").await.unwrap();
        assert!(other.is_connected());

        channel.send_text("from a").await.unwrap();
        other.send_text("from b").await.unwrap();
        assert_eq!(channel.sent_frames().len(), 2);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let channel = MockChannel::new();
        channel.connect("addr").await.unwrap();
        channel.send_text("data").await.unwrap();
        channel.queue_text("queued");

        channel.reset();

        assert!(!channel.is_connected());
        assert!(channel.sent_frames().is_empty());
        assert!(channel.connected_address().is_none());
        assert_eq!(channel.connect_count(), 0);
    }
}

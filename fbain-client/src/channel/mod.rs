//! Duplex block channel abstraction.
//!
//! This module provides a pluggable channel layer that abstracts the
//! long-lived bidirectional connection used for block transfer (WebSocket
//! in the reference deployment, mock for testing).
//!
//! # Design
//!
//! The channel trait is async and connection-oriented:
//! - `connect()` establishes a connection for a session token or file id
//! - `send_text()` / `send_binary()` transmit control and ciphertext frames
//! - `recv()` receives the next frame
//! - `close()` gracefully terminates
//!
//! A transfer owns exactly one channel and reconnects through the same
//! instance; the cursor that makes resumption possible lives outside the
//! connection, in the driver and the key material.

mod mock;

pub use mock::MockChannel;

use async_trait::async_trait;
use thiserror::Error;

/// Channel errors. All of these are transport-level and retriable, in
/// contrast to cryptographic and protocol failures.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed before the transfer finished.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout.
    #[error("connection timeout")]
    Timeout,
}

/// One frame on the duplex channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A JSON control frame.
    Text(String),
    /// A raw ciphertext frame.
    Binary(Vec<u8>),
}

/// Duplex channel for exchanging control and ciphertext frames with the host.
///
/// Implementations handle the underlying connection mechanism
/// (WebSocket, mock, etc).
#[async_trait]
pub trait BlockChannel: Send + Sync {
    /// Connect to the endpoint identified by the given address.
    ///
    /// For uploads this is the session token, for downloads the file id.
    async fn connect(&self, address: &str) -> Result<(), ChannelError>;

    /// Send a JSON control frame.
    async fn send_text(&self, text: &str) -> Result<(), ChannelError>;

    /// Send a raw ciphertext frame.
    async fn send_binary(&self, data: &[u8]) -> Result<(), ChannelError>;

    /// Receive the next frame.
    ///
    /// Blocks until a frame is available or the connection closes.
    async fn recv(&self) -> Result<Frame, ChannelError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), ChannelError>;
}

//! Transfer-level error taxonomy.

use thiserror::Error;

use crate::api::ApiError;
use crate::channel::ChannelError;
use crate::crypto::CryptoError;
use fbain_types::FrameError;

/// Errors surfaced by the upload and download drivers.
///
/// Only channel-level failures are ever retried, and only until the retry
/// policy is exhausted; everything else is terminal the moment it occurs.
/// Cryptographic failures in particular are never retried: repeating them
/// cannot change the outcome and risks nonce misuse.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A cryptographic operation failed. Fatal.
    #[error("crypto failure: {0}")]
    Crypto(#[from] CryptoError),

    /// The channel failed beyond what the retry policy absorbs.
    #[error("channel failure: {0}")]
    Channel(#[from] ChannelError),

    /// A REST call against the host failed.
    #[error("host api failure: {0}")]
    Api(#[from] ApiError),

    /// The host sent a frame this client cannot parse.
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),

    /// The filename did not decrypt: wrong password or corrupted link.
    ///
    /// Deliberately distinct from transport problems; this is the message a
    /// receiver with a mistyped password must see.
    #[error("wrong password or corrupted link")]
    WrongPassword,

    /// The host rejected the transfer with a protocol error frame.
    #[error("host rejected the transfer ({code}): {detail}")]
    Rejected {
        /// Numeric rejection code from the host.
        code: u16,
        /// Human-readable detail from the host.
        detail: String,
    },

    /// The host violated the protocol. Fatal, never retried.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// No file under the given identifier.
    #[error("file not found")]
    NotFound,

    /// The reconnect bound was exhausted.
    #[error("gave up after {attempts} reconnect attempts")]
    RetriesExhausted {
        /// Number of attempts that were made.
        attempts: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_password_is_user_facing() {
        let err = TransferError::WrongPassword;
        assert_eq!(err.to_string(), "wrong password or corrupted link");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TransferError>();
    }
}

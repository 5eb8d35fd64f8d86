//! # fbain-client
//!
//! Client library for the f.bain end-to-end encrypted file transfer
//! protocol.
//!
//! A sender encrypts a file block by block under a password-derived key and
//! streams the ciphertext to a host over a resumable duplex channel; a
//! receiver holding the same password reverses the process, verifying
//! authenticity per block. The host never sees plaintext, the filename
//! travels encrypted, and the salt it stores is useless without the
//! password.
//!
//! ## Features
//!
//! - **E2E Encryption**: AES-128-GCM with counter-derived nonces
//! - **Password-Derived Keys**: one PBKDF2-HMAC-SHA-256 call yields the key
//!   and both IV bases
//! - **Resumable Transfers**: reconnect-and-resume with counter rollback on
//!   the upload path
//! - **Pluggable Transport**: channel and host-API traits with mock
//!   implementations for tests
//! - **Pure State Machines**: protocol logic lives in fbain-core,
//!   side-effect free
//!
//! ## Example
//!
//! ```ignore
//! use fbain_client::{Uploader, UploadConfig, HttpHostApi};
//! use fbain_core::NullSink;
//!
//! let api = HttpHostApi::new("https://f.bain.example");
//! let uploader = Uploader::new(api, channel, UploadConfig::new());
//!
//! let outcome = uploader.upload("notes.txt", &data, &NullSink).await?;
//! println!("share: /{}#{}", outcome.uuid, outcome.password);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod channel;
pub mod crypto;
pub mod download;
pub mod error;
pub mod password;
pub mod upload;

pub use api::{ApiError, HostApi, HttpHostApi, MockHostApi};
pub use channel::{BlockChannel, ChannelError, Frame, MockChannel};
pub use crypto::{
    CryptoError, KeyMaterial, KeyProfile, DERIVED_SIZE, IV_BASE_SIZE, KEY_SIZE, NONCE_SIZE,
    PBKDF2_ITERATIONS,
};
pub use download::{DownloadConfig, DownloadedFile, Downloader, RemoteFile};
pub use error::TransferError;
pub use password::{generate_password, DEFAULT_PASSWORD_LENGTH, PASSWORD_ALPHABET};
pub use upload::{UploadConfig, UploadOutcome, Uploader};

// The progress and retry types appear in this crate's public API; re-export
// them so applications do not need a direct fbain-core dependency.
pub use fbain_core::{NullSink, Phase, ProgressSink, ProgressUpdate, RetryPolicy};

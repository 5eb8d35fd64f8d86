//! REST payloads for session creation, metadata, and expiration.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    frames::{BLOCK_SIZE, TAG_SIZE},
    Salt, SessionToken,
};

/// Total ciphertext length for a plaintext of the given size.
///
/// Every block carries a fixed tag overhead, so the host is told
/// `ceil(len / BLOCK_SIZE) * TAG_SIZE + len` up front and can pre-allocate
/// exactly that much storage.
pub fn ciphertext_length(plaintext_len: u64) -> u64 {
    plaintext_len.div_ceil(BLOCK_SIZE as u64) * TAG_SIZE as u64 + plaintext_len
}

/// Body of the session creation request (`POST /upload`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Base64 of the AEAD-encrypted filename (ciphertext plus tag).
    pub filename: String,
    /// The key derivation salt, published alongside the file.
    pub salt: Salt,
    /// Exact total ciphertext length the host must expect.
    pub content_length: u64,
}

/// Successful session creation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGrant {
    /// Token addressing this upload attempt across reconnects.
    pub session_token: SessionToken,
}

/// Public metadata for a stored file (`GET /{id}/meta`).
///
/// Everything here is safe to publish: the salt is useless without the
/// password and the filename is ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// The key derivation salt.
    pub salt: Salt,
    /// Base64 of the AEAD-encrypted filename.
    pub filename: String,
    /// Total ciphertext length in bytes.
    pub content_length: u64,
}

/// One field error from a session creation validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Location of the offending field in the request body.
    pub loc: Vec<String>,
    /// Human-readable description of the problem.
    pub msg: String,
}

/// Structured validation failure (HTTP 422) from session creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    /// The per-field error list.
    pub detail: Vec<FieldError>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.detail.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", e.loc.join("."), e.msg)?;
        }
        Ok(())
    }
}

/// Expiration timestamp payload (`GET`/`PUT /{id}/expire`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiresAt {
    /// Unix seconds timestamp at which the file expires.
    pub expires_at: i64,
}

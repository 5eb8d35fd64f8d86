//! Host REST API abstraction.
//!
//! The host exposes a handful of plain HTTP endpoints around the block
//! channels: session creation for uploads, public metadata for downloads,
//! and the revocation/expiration calls authorized by the credential issued
//! at upload completion. This module abstracts them behind a trait so the
//! transfer drivers can be tested against a mock.

mod http;
mod mock;

pub use http::HttpHostApi;
pub use mock::MockHostApi;

use async_trait::async_trait;
use thiserror::Error;

use fbain_types::{FileId, FileMeta, RevocationToken, SessionGrant, SessionRequest, ValidationErrors};

/// Host API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP request itself failed.
    #[error("http request failed: {0}")]
    Http(String),

    /// Session creation failed validation, with per-field detail.
    #[error("session validation failed: {0}")]
    Validation(ValidationErrors),

    /// The host refused the session for another reason (e.g. file too large).
    #[error("session refused: {0}")]
    SessionRefused(String),

    /// No file under the given identifier.
    #[error("file not found")]
    NotFound,

    /// The revocation credential was not accepted.
    #[error("not authorized")]
    Unauthorized,

    /// The host answered with something this client cannot parse.
    #[error("malformed host response: {0}")]
    InvalidResponse(String),
}

/// The host's REST surface.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Create an upload session, declaring the encrypted filename, the salt,
    /// and the exact total ciphertext length.
    async fn create_session(&self, request: &SessionRequest) -> Result<SessionGrant, ApiError>;

    /// Fetch the public metadata of a stored file.
    async fn fetch_meta(&self, id: &FileId) -> Result<FileMeta, ApiError>;

    /// Delete a stored file.
    async fn revoke(&self, id: &FileId, token: &RevocationToken) -> Result<(), ApiError>;

    /// Get the expiration timestamp of a stored file (unix seconds).
    async fn expires_at(&self, id: &FileId, token: &RevocationToken) -> Result<i64, ApiError>;

    /// Set the expiration timestamp of a stored file (unix seconds).
    async fn set_expires_at(
        &self,
        id: &FileId,
        token: &RevocationToken,
        timestamp: i64,
    ) -> Result<(), ApiError>;
}

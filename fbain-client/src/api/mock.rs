//! Mock host API for testing.
//!
//! Serves configured responses and records every request for verification.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{ApiError, HostApi};
use fbain_types::{FileId, FileMeta, RevocationToken, SessionGrant, SessionRequest, SessionToken};

/// Mock host API for testing.
///
/// Clones share state, so a test can keep a handle for scripting and
/// verification while the driver owns another.
#[derive(Debug, Default)]
pub struct MockHostApi {
    inner: Arc<Mutex<MockHostApiInner>>,
}

#[derive(Debug, Default)]
struct MockHostApiInner {
    grant: Option<SessionToken>,
    meta: Option<FileMeta>,
    expires_at: i64,
    session_requests: Vec<SessionRequest>,
    meta_requests: Vec<FileId>,
    revocations: Vec<(FileId, RevocationToken)>,
    expiration_updates: Vec<(FileId, i64)>,
    fail_next_create_session: Option<ApiError>,
    fail_next_fetch_meta: Option<ApiError>,
}

impl MockHostApi {
    /// Create a new mock host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant sessions under the given token.
    pub fn grant_sessions(&self, token: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.grant = Some(SessionToken::new(token));
    }

    /// Serve the given metadata for every `fetch_meta`.
    pub fn serve_meta(&self, meta: FileMeta) {
        let mut inner = self.inner.lock().unwrap();
        inner.meta = Some(meta);
    }

    /// Set the expiration timestamp `expires_at` reports.
    pub fn set_expiration(&self, timestamp: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.expires_at = timestamp;
    }

    /// Cause the next `create_session` to fail with the given error.
    pub fn fail_next_create_session(&self, error: ApiError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_create_session = Some(error);
    }

    /// Cause the next `fetch_meta` to fail with the given error.
    pub fn fail_next_fetch_meta(&self, error: ApiError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_fetch_meta = Some(error);
    }

    /// Get every session request that was made.
    pub fn session_requests(&self) -> Vec<SessionRequest> {
        let inner = self.inner.lock().unwrap();
        inner.session_requests.clone()
    }

    /// Get every metadata request that was made.
    pub fn meta_requests(&self) -> Vec<FileId> {
        let inner = self.inner.lock().unwrap();
        inner.meta_requests.clone()
    }

    /// Get every revocation that was made.
    pub fn revocations(&self) -> Vec<(FileId, RevocationToken)> {
        let inner = self.inner.lock().unwrap();
        inner.revocations.clone()
    }

    /// Get every expiration update that was made.
    pub fn expiration_updates(&self) -> Vec<(FileId, i64)> {
        let inner = self.inner.lock().unwrap();
        inner.expiration_updates.clone()
    }
}

impl Clone for MockHostApi {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl HostApi for MockHostApi {
    async fn create_session(&self, request: &SessionRequest) -> Result<SessionGrant, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.session_requests.push(request.clone());

        if let Some(error) = inner.fail_next_create_session.take() {
            return Err(error);
        }

        inner
            .grant
            .clone()
            .map(|session_token| SessionGrant { session_token })
            .ok_or_else(|| ApiError::Http("no session configured".into()))
    }

    async fn fetch_meta(&self, id: &FileId) -> Result<FileMeta, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.meta_requests.push(id.clone());

        if let Some(error) = inner.fail_next_fetch_meta.take() {
            return Err(error);
        }

        inner.meta.clone().ok_or(ApiError::NotFound)
    }

    async fn revoke(&self, id: &FileId, token: &RevocationToken) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.revocations.push((id.clone(), token.clone()));
        Ok(())
    }

    async fn expires_at(&self, _id: &FileId, _token: &RevocationToken) -> Result<i64, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.expires_at)
    }

    async fn set_expires_at(
        &self,
        id: &FileId,
        _token: &RevocationToken,
        timestamp: i64,
    ) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.expiration_updates.push((id.clone(), timestamp));
        inner.expires_at = timestamp;
        Ok(())
    }
}

//! HTTP implementation of the host API.

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, StatusCode};

use super::{ApiError, HostApi};
use fbain_types::{
    ExpiresAt, FileId, FileMeta, RevocationToken, SessionGrant, SessionRequest, ValidationErrors,
};

/// Host API client over plain HTTPS.
///
/// Routes follow the reference host: `POST /upload`, `GET /{id}/meta`,
/// `DELETE /{id}`, and `GET`/`PUT /{id}/expire` with the revocation
/// credential in the `authorization` header.
#[derive(Debug, Clone)]
pub struct HttpHostApi {
    base: String,
    client: reqwest::Client,
}

impl HttpHostApi {
    /// Create a client for a host base URL, e.g. `https://f.bain.cz`
    /// (no trailing slash).
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Http(e.to_string())
    }
}

/// Distinguish a structured validation failure from a plain refusal.
///
/// The host wraps both in a `detail` field: validation errors carry a list
/// of `{loc, msg}` entries, refusals a bare string.
fn parse_refusal(body: &str) -> ApiError {
    if let Ok(errors) = serde_json::from_str::<ValidationErrors>(body) {
        return ApiError::Validation(errors);
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(detail) = value.get("detail").and_then(|d| d.as_str()) {
            return ApiError::SessionRefused(detail.to_string());
        }
    }
    ApiError::SessionRefused(body.to_string())
}

#[async_trait]
impl HostApi for HttpHostApi {
    async fn create_session(&self, request: &SessionRequest) -> Result<SessionGrant, ApiError> {
        let response = self
            .client
            .post(self.url("upload"))
            .json(request)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.text().await?;
                Err(parse_refusal(&body))
            }
            status if !status.is_success() => {
                Err(ApiError::Http(format!("session creation failed: {status}")))
            }
            _ => response
                .json::<SessionGrant>()
                .await
                .map_err(|e| ApiError::InvalidResponse(e.to_string())),
        }
    }

    async fn fetch_meta(&self, id: &FileId) -> Result<FileMeta, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("{}/meta", id)))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            status if !status.is_success() => {
                Err(ApiError::Http(format!("metadata fetch failed: {status}")))
            }
            _ => response
                .json::<FileMeta>()
                .await
                .map_err(|e| ApiError::InvalidResponse(e.to_string())),
        }
    }

    async fn revoke(&self, id: &FileId, token: &RevocationToken) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(id.as_str()))
            .header(AUTHORIZATION, token.as_str())
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Unauthorized),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            status if !status.is_success() => {
                Err(ApiError::Http(format!("revocation failed: {status}")))
            }
            _ => Ok(()),
        }
    }

    async fn expires_at(&self, id: &FileId, token: &RevocationToken) -> Result<i64, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("{}/expire", id)))
            .header(AUTHORIZATION, token.as_str())
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Unauthorized),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            status if !status.is_success() => {
                Err(ApiError::Http(format!("expiration fetch failed: {status}")))
            }
            _ => response
                .json::<ExpiresAt>()
                .await
                .map(|e| e.expires_at)
                .map_err(|e| ApiError::InvalidResponse(e.to_string())),
        }
    }

    async fn set_expires_at(
        &self,
        id: &FileId,
        token: &RevocationToken,
        timestamp: i64,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .put(self.url(&format!("{}/expire", id)))
            .header(AUTHORIZATION, token.as_str())
            .json(&ExpiresAt {
                expires_at: timestamp,
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Unauthorized),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            status if !status.is_success() => {
                Err(ApiError::Http(format!("expiration update failed: {status}")))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_host_routes() {
        let api = HttpHostApi::new("https://example.org");
        assert_eq!(api.url("upload"), "https://example.org/upload");
        assert_eq!(api.url("aB3$x/meta"), "https://example.org/aB3$x/meta");
    }

    #[test]
    fn structured_validation_detail_is_parsed() {
        let body = r#"{"detail": [{"loc": ["body", "salt"], "msg": "wrong length"}]}"#;
        match parse_refusal(body) {
            ApiError::Validation(errors) => {
                assert_eq!(errors.detail.len(), 1);
                assert_eq!(errors.detail[0].msg, "wrong length");
            }
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn plain_detail_is_a_refusal() {
        let body = r#"{"detail": "File too large"}"#;
        match parse_refusal(body) {
            ApiError::SessionRefused(msg) => assert_eq!(msg, "File too large"),
            other => panic!("expected SessionRefused, got {:?}", other),
        }
    }

    #[test]
    fn unparseable_body_is_passed_through() {
        match parse_refusal("boom") {
            ApiError::SessionRefused(msg) => assert_eq!(msg, "boom"),
            other => panic!("expected SessionRefused, got {:?}", other),
        }
    }
}

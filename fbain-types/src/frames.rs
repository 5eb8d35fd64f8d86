//! Control frames for the duplex block channels.
//!
//! The host drives the upload channel by unicasting JSON control frames,
//! each tagged with a numeric `code`; the client answers with raw binary
//! ciphertext frames. On the download channel the roles flip: the client
//! sends JSON read requests and the host answers with binary ciphertext.

use serde::{Deserialize, Serialize};

use crate::{FileId, FrameError, RevocationToken};

/// Plaintext block size in bytes (1 MiB).
///
/// Every block of a file except possibly the last has exactly this size
/// before encryption; its ciphertext is `BLOCK_SIZE + TAG_SIZE` bytes.
pub const BLOCK_SIZE: usize = 1024 * 1024;

/// AEAD authentication tag overhead per block in bytes.
pub const TAG_SIZE: usize = 16;

/// A control frame received on the upload channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadControl {
    /// Code 100: the host needs block `block` next.
    NeedBlock {
        /// Zero-based index of the requested plaintext block.
        block: u64,
    },
    /// Code 201: the upload is complete and the file is stored.
    Complete {
        /// Identifier under which the file is now reachable.
        uuid: FileId,
        /// Credential authorizing deletion/expiration changes.
        revocation_token: RevocationToken,
    },
    /// Code 401 or 414: the host rejected the transfer.
    Rejected {
        /// The numeric rejection code.
        code: u16,
        /// Human-readable detail from the host.
        detail: String,
    },
}

#[derive(Deserialize)]
struct RawUploadControl {
    code: u16,
    block: Option<u64>,
    uuid: Option<String>,
    revocation_token: Option<String>,
    detail: Option<String>,
}

impl UploadControl {
    /// Parse an upload control frame from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, FrameError> {
        let raw: RawUploadControl =
            serde_json::from_str(text).map_err(FrameError::Deserialization)?;
        match raw.code {
            100 => Ok(Self::NeedBlock {
                block: raw.block.ok_or(FrameError::MissingField("block"))?,
            }),
            201 => Ok(Self::Complete {
                uuid: FileId::new(raw.uuid.ok_or(FrameError::MissingField("uuid"))?),
                revocation_token: RevocationToken::new(
                    raw.revocation_token
                        .ok_or(FrameError::MissingField("revocation_token"))?,
                ),
            }),
            401 | 414 => Ok(Self::Rejected {
                code: raw.code,
                detail: raw.detail.unwrap_or_default(),
            }),
            other => Err(FrameError::UnknownCode(other)),
        }
    }
}

/// The first frame received on the download channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Code 200: the file exists and binary frames will follow on request.
    Found,
    /// Code 404: no file under this identifier. Terminal, never retried.
    NotFound,
}

#[derive(Deserialize)]
struct RawDownloadStatus {
    code: u16,
}

impl DownloadStatus {
    /// Parse the status frame from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, FrameError> {
        let raw: RawDownloadStatus =
            serde_json::from_str(text).map_err(FrameError::Deserialization)?;
        match raw.code {
            200 => Ok(Self::Found),
            404 => Ok(Self::NotFound),
            other => Err(FrameError::UnknownCode(other)),
        }
    }
}

/// A client request for the next ciphertext span on the download channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadRequest {
    /// Number of ciphertext bytes to read (one encrypted block).
    pub read: u64,
    /// Absolute byte offset to seek to before reading.
    ///
    /// Sent on the first request of a connection so a resumed download
    /// continues from the last confirmed offset; omitted on subsequent
    /// requests, which continue sequentially.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seek: Option<u64>,
}

impl ReadRequest {
    /// Request the next encrypted block, continuing sequentially.
    pub fn next() -> Self {
        Self {
            read: (BLOCK_SIZE + TAG_SIZE) as u64,
            seek: None,
        }
    }

    /// Request an encrypted block starting at an explicit ciphertext offset.
    pub fn resume_at(offset: u64) -> Self {
        Self {
            read: (BLOCK_SIZE + TAG_SIZE) as u64,
            seek: Some(offset),
        }
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(FrameError::Serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===========================================
    // UploadControl Tests
    // ===========================================

    #[test]
    fn need_block_parses() {
        let frame = UploadControl::from_json(r#"{"code": 100, "block": 7}"#).unwrap();
        assert_eq!(frame, UploadControl::NeedBlock { block: 7 });
    }

    #[test]
    fn need_block_without_index_fails() {
        let err = UploadControl::from_json(r#"{"code": 100}"#).unwrap_err();
        assert!(matches!(err, FrameError::MissingField("block")));
    }

    #[test]
    fn complete_parses() {
        let frame = UploadControl::from_json(
            r#"{"code": 201, "uuid": "aB3$x", "revocation_token": "tok"}"#,
        )
        .unwrap();
        match frame {
            UploadControl::Complete {
                uuid,
                revocation_token,
            } => {
                assert_eq!(uuid.as_str(), "aB3$x");
                assert_eq!(revocation_token.as_str(), "tok");
            }
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn rejection_codes_parse() {
        for code in [401u16, 414] {
            let text = format!(r#"{{"code": {}, "detail": "nope"}}"#, code);
            let frame = UploadControl::from_json(&text).unwrap();
            assert_eq!(
                frame,
                UploadControl::Rejected {
                    code,
                    detail: "nope".into()
                }
            );
        }
    }

    #[test]
    fn rejection_detail_is_optional() {
        let frame = UploadControl::from_json(r#"{"code": 401}"#).unwrap();
        assert!(matches!(frame, UploadControl::Rejected { code: 401, .. }));
    }

    #[test]
    fn unknown_code_is_rejected() {
        let err = UploadControl::from_json(r#"{"code": 999}"#).unwrap_err();
        assert!(matches!(err, FrameError::UnknownCode(999)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = UploadControl::from_json("not json").unwrap_err();
        assert!(matches!(err, FrameError::Deserialization(_)));
    }

    // ===========================================
    // DownloadStatus Tests
    // ===========================================

    #[test]
    fn status_codes_parse() {
        assert_eq!(
            DownloadStatus::from_json(r#"{"code": 200}"#).unwrap(),
            DownloadStatus::Found
        );
        assert_eq!(
            DownloadStatus::from_json(r#"{"code": 404}"#).unwrap(),
            DownloadStatus::NotFound
        );
    }

    #[test]
    fn status_unknown_code_is_rejected() {
        let err = DownloadStatus::from_json(r#"{"code": 500}"#).unwrap_err();
        assert!(matches!(err, FrameError::UnknownCode(500)));
    }

    // ===========================================
    // ReadRequest Tests
    // ===========================================

    #[test]
    fn read_request_spans_one_encrypted_block() {
        let request = ReadRequest::next();
        assert_eq!(request.read, (BLOCK_SIZE + TAG_SIZE) as u64);
        assert!(request.seek.is_none());
    }

    #[test]
    fn sequential_request_omits_seek() {
        let json = ReadRequest::next().to_json().unwrap();
        assert_eq!(json, r#"{"read":1048592}"#);
    }

    #[test]
    fn resume_request_carries_seek() {
        let json = ReadRequest::resume_at(2097184).to_json().unwrap();
        assert_eq!(json, r#"{"read":1048592,"seek":2097184}"#);
    }

    #[test]
    fn resume_at_zero_is_explicit() {
        // A fresh download still announces its offset on the first request.
        let json = ReadRequest::resume_at(0).to_json().unwrap();
        assert_eq!(json, r#"{"read":1048592,"seek":0}"#);
    }
}

//! # fbain-types
//!
//! Wire format types for the f.bain encrypted file transfer protocol.
//!
//! This crate provides the foundational types used across all fbain crates:
//! - [`FileId`], [`SessionToken`], [`RevocationToken`], [`Salt`] - Identity and credential types
//! - [`UploadControl`], [`DownloadStatus`], [`ReadRequest`] - Duplex channel frames
//! - [`SessionRequest`], [`FileMeta`] - REST payloads
//! - [`FrameError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frames;
mod ids;
mod rest;

pub use error::FrameError;
pub use frames::{DownloadStatus, ReadRequest, UploadControl, BLOCK_SIZE, TAG_SIZE};
pub use ids::{FileId, RevocationToken, Salt, SessionToken};
pub use rest::{
    ciphertext_length, ExpiresAt, FieldError, FileMeta, SessionGrant, SessionRequest,
    ValidationErrors,
};

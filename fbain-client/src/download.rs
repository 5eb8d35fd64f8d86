//! Download driver.
//!
//! [`Downloader`] runs the receiver side of a transfer: fetch the public
//! metadata, re-derive the key from the password and salt, decrypt the
//! filename (the password-correctness check), then pull encrypted blocks
//! over the duplex channel until the declared length is reached.
//!
//! Protocol logic lives in the pure [`DownloadState`] machine from
//! fbain-core; this module interprets the machine's actions against the
//! real channel, API, and key material.

use std::collections::VecDeque;

use fbain_core::{
    DownloadAction, DownloadEvent, DownloadState, Phase, ProgressSink, ProgressUpdate, RetryPolicy,
};
use fbain_types::{DownloadStatus, FileId, ReadRequest};

use crate::api::{ApiError, HostApi};
use crate::channel::{BlockChannel, Frame};
use crate::crypto::{CryptoError, KeyMaterial, KeyProfile};
use crate::error::TransferError;

/// Configuration for a download.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Key derivation work factor; must match the uploader's.
    pub key_profile: KeyProfile,
    /// Reconnect policy for channel failures.
    pub retry: RetryPolicy,
}

impl DownloadConfig {
    /// Create a configuration with protocol defaults.
    pub fn new() -> Self {
        Self {
            key_profile: KeyProfile::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Set the key derivation work factor.
    pub fn with_key_profile(mut self, profile: KeyProfile) -> Self {
        self.key_profile = profile;
        self
    }

    /// Set the reconnect policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What the receiver learns about a file before pulling its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// The decrypted original filename.
    pub filename: String,
    /// Total ciphertext length in bytes.
    pub content_length: u64,
}

/// A fully downloaded and decrypted file.
pub struct DownloadedFile {
    /// The decrypted original filename.
    pub filename: String,
    /// The decrypted content.
    pub data: Vec<u8>,
}

// Don't leak file contents in debug output
impl std::fmt::Debug for DownloadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadedFile")
            .field("filename", &self.filename)
            .field("data", &format!("[{} bytes REDACTED]", self.data.len()))
            .finish()
    }
}

/// The receiver side of a transfer.
pub struct Downloader<A: HostApi, C: BlockChannel> {
    api: A,
    channel: C,
    config: DownloadConfig,
}

/// Advance a machine and queue its actions.
fn drive(state: &mut DownloadState, queue: &mut VecDeque<DownloadAction>, event: DownloadEvent) {
    let (next, actions) = std::mem::take(state).on_event(event);
    *state = next;
    queue.extend(actions);
}

impl<A: HostApi, C: BlockChannel> Downloader<A, C> {
    /// Create a downloader over the given API and channel.
    pub fn new(api: A, channel: C, config: DownloadConfig) -> Self {
        Self {
            api,
            channel,
            config,
        }
    }

    /// Fetch metadata and decrypt the filename without pulling content.
    ///
    /// This is the cheap password check: a wrong password fails here, before
    /// any block is transferred.
    pub async fn inspect(
        &self,
        id: &FileId,
        password: &str,
    ) -> Result<RemoteFile, TransferError> {
        let (_, remote) = self.resolve(id, password, &fbain_core::NullSink).await?;
        Ok(remote)
    }

    /// Download and decrypt one file.
    pub async fn download(
        &self,
        id: &FileId,
        password: &str,
        progress: &dyn ProgressSink,
    ) -> Result<DownloadedFile, TransferError> {
        let (mut key, remote) = self.resolve(id, password, progress).await?;
        let total = remote.content_length;

        if total == 0 {
            return Ok(DownloadedFile {
                filename: remote.filename,
                data: Vec::new(),
            });
        }

        let mut state = DownloadState::new();
        let mut policy = self.config.retry.clone();
        let mut queue: VecDeque<DownloadAction> = VecDeque::new();
        let mut output: Vec<u8> = Vec::new();
        let mut offset: u64 = 0;
        let mut failure: Option<TransferError> = None;

        drive(&mut state, &mut queue, DownloadEvent::Start);

        loop {
            let Some(action) = queue.pop_front() else {
                match state {
                    DownloadState::Completed => break,
                    DownloadState::Failed => {
                        return Err(failure.take().unwrap_or(TransferError::ProtocolViolation(
                            "download failed without detail".into(),
                        )))
                    }
                    _ => {}
                }
                // Nothing queued and not terminal: await the next host frame.
                let event = self
                    .next_event(&state, &mut key, &mut output, &mut offset, total, progress, &mut failure)
                    .await?;
                drive(&mut state, &mut queue, event);
                continue;
            };

            match action {
                DownloadAction::OpenChannel => match self.channel.connect(id.as_str()).await {
                    Ok(()) => drive(&mut state, &mut queue, DownloadEvent::ChannelOpened),
                    Err(e) => {
                        tracing::warn!(error = %e, "download channel connect failed");
                        drive(
                            &mut state,
                            &mut queue,
                            DownloadEvent::ChannelLost {
                                reason: e.to_string(),
                            },
                        );
                    }
                },

                DownloadAction::ResetRetries => policy.record_success(),

                DownloadAction::RequestRead { seek } => {
                    let request = match seek {
                        Some(position) => ReadRequest::resume_at(position),
                        None => ReadRequest::next(),
                    };
                    match self.channel.send_text(&request.to_json()?).await {
                        Ok(()) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "read request failed");
                            drive(
                                &mut state,
                                &mut queue,
                                DownloadEvent::ChannelLost {
                                    reason: e.to_string(),
                                },
                            );
                        }
                    }
                }

                DownloadAction::StartBackoffTimer => match policy.next_delay() {
                    Some(delay) => {
                        progress.update(
                            ProgressUpdate::phase(Phase::Reconnecting)
                                .with_detail(format!("reconnecting in {}s", delay.as_secs())),
                        );
                        tokio::time::sleep(delay).await;
                        drive(&mut state, &mut queue, DownloadEvent::BackoffElapsed);
                    }
                    None => {
                        failure = Some(TransferError::RetriesExhausted {
                            attempts: policy.max_attempts(),
                        });
                        drive(&mut state, &mut queue, DownloadEvent::RetriesExhausted);
                    }
                },

                DownloadAction::CloseChannel => {
                    let _ = self.channel.close().await;
                }
            }
        }

        Ok(DownloadedFile {
            filename: remote.filename,
            data: output,
        })
    }

    /// Fetch metadata, derive the key, and decrypt the filename.
    async fn resolve(
        &self,
        id: &FileId,
        password: &str,
        progress: &dyn ProgressSink,
    ) -> Result<(KeyMaterial, RemoteFile), TransferError> {
        progress.update(ProgressUpdate::phase(Phase::FetchingMetadata));
        let meta = self.api.fetch_meta(id).await.map_err(|e| match e {
            ApiError::NotFound => TransferError::NotFound,
            other => TransferError::Api(other),
        })?;

        let key = KeyMaterial::derive_with_profile(password, &meta.salt, self.config.key_profile)?;

        let filename = match key.decrypt_filename(&meta.filename) {
            Ok(name) => name,
            // The filename is the password-correctness check; surface this
            // distinctly from any transport problem.
            Err(CryptoError::Decryption) => return Err(TransferError::WrongPassword),
            Err(other) => return Err(TransferError::Crypto(other)),
        };

        Ok((
            key,
            RemoteFile {
                filename,
                content_length: meta.content_length,
            },
        ))
    }

    /// Await the next host frame and translate it into a machine event.
    ///
    /// Returns `Err` only for failures that are fatal regardless of machine
    /// state (counter exhaustion and the like).
    #[allow(clippy::too_many_arguments)]
    async fn next_event(
        &self,
        state: &DownloadState,
        key: &mut KeyMaterial,
        output: &mut Vec<u8>,
        offset: &mut u64,
        total: u64,
        progress: &dyn ProgressSink,
        failure: &mut Option<TransferError>,
    ) -> Result<DownloadEvent, TransferError> {
        match self.channel.recv().await {
            Ok(Frame::Text(text)) => {
                if !matches!(state, DownloadState::AwaitingStatus { .. }) {
                    *failure = Some(TransferError::ProtocolViolation(
                        "unexpected control frame mid-stream".into(),
                    ));
                    return Ok(DownloadEvent::ProtocolViolated);
                }
                match DownloadStatus::from_json(&text) {
                    Ok(DownloadStatus::Found) => Ok(DownloadEvent::StatusOk),
                    Ok(DownloadStatus::NotFound) => {
                        *failure = Some(TransferError::NotFound);
                        Ok(DownloadEvent::NotFound)
                    }
                    Err(e) => {
                        *failure = Some(TransferError::Frame(e));
                        Ok(DownloadEvent::ProtocolViolated)
                    }
                }
            }
            Ok(Frame::Binary(ciphertext)) => {
                if !matches!(state, DownloadState::Streaming { .. }) {
                    *failure = Some(TransferError::ProtocolViolation(
                        "binary frame before status".into(),
                    ));
                    return Ok(DownloadEvent::ProtocolViolated);
                }
                match key.decrypt_block(&ciphertext) {
                    Ok(plaintext) => {
                        output.extend_from_slice(&plaintext);
                        *offset += ciphertext.len() as u64;
                        if *offset > total {
                            *failure = Some(TransferError::ProtocolViolation(
                                "host sent more data than declared".into(),
                            ));
                            return Ok(DownloadEvent::ProtocolViolated);
                        }
                        progress.update(ProgressUpdate::fraction(
                            Phase::Downloading,
                            *offset as f64 / total as f64,
                        ));
                        Ok(DownloadEvent::BlockDecrypted {
                            offset: *offset,
                            total,
                        })
                    }
                    Err(CryptoError::Authentication) => {
                        tracing::error!(offset = *offset, "block failed authentication");
                        *failure = Some(TransferError::Crypto(CryptoError::Authentication));
                        Ok(DownloadEvent::AuthenticationFailed)
                    }
                    Err(other) => Err(TransferError::Crypto(other)),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "download channel lost");
                Ok(DownloadEvent::ChannelLost {
                    reason: e.to_string(),
                })
            }
        }
    }
}

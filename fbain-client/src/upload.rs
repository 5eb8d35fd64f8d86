//! Upload driver.
//!
//! [`Uploader`] runs the sender side of a transfer: derive a key from a
//! freshly generated password, encrypt the filename, create a session, then
//! answer the host's block requests over the duplex channel until the host
//! confirms storage.
//!
//! Protocol logic lives in the pure [`UploadState`] machine from fbain-core;
//! this module interprets the machine's actions against the real channel,
//! API, and key material.

use std::collections::VecDeque;

use fbain_core::{
    Phase, ProgressSink, ProgressUpdate, RetryPolicy, UploadAction, UploadEvent, UploadState,
};
use fbain_types::{
    ciphertext_length, FileId, RevocationToken, Salt, SessionRequest, SessionToken, UploadControl,
    BLOCK_SIZE,
};

use crate::api::HostApi;
use crate::channel::{BlockChannel, Frame};
use crate::crypto::{KeyMaterial, KeyProfile};
use crate::error::TransferError;
use crate::password::{generate_password, DEFAULT_PASSWORD_LENGTH};

/// Configuration for an upload.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Length of the generated password.
    pub password_length: usize,
    /// Key derivation work factor.
    pub key_profile: KeyProfile,
    /// Reconnect policy for channel failures.
    pub retry: RetryPolicy,
}

impl UploadConfig {
    /// Create a configuration with protocol defaults.
    pub fn new() -> Self {
        Self {
            password_length: DEFAULT_PASSWORD_LENGTH,
            key_profile: KeyProfile::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Set the generated password length.
    pub fn with_password_length(mut self, length: usize) -> Self {
        self.password_length = length;
        self
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

impl Default for UploadConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the sender needs to share or keep after a successful upload.
pub struct UploadOutcome {
    /// Identifier under which the file is stored.
    pub uuid: FileId,
    /// Credential authorizing deletion/expiration changes.
    pub revocation_token: RevocationToken,
    /// The generated password; the only way to ever decrypt the file.
    pub password: String,
}

// Don't leak the password in debug output
impl std::fmt::Debug for UploadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOutcome")
            .field("uuid", &self.uuid)
            .field("revocation_token", &self.revocation_token)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// The sender side of a transfer.
pub struct Uploader<A: HostApi, C: BlockChannel> {
    api: A,
    channel: C,
    config: UploadConfig,
}

/// Advance a machine and queue its actions.
fn drive(state: &mut UploadState, queue: &mut VecDeque<UploadAction>, event: UploadEvent) {
    let (next, actions) = std::mem::take(state).on_event(event);
    *state = next;
    queue.extend(actions);
}

impl<A: HostApi, C: BlockChannel> Uploader<A, C> {
    /// Create an uploader over the given API and channel.
    pub fn new(api: A, channel: C, config: UploadConfig) -> Self {
        Self {
            api,
            channel,
            config,
        }
    }

    /// Encrypt and upload one file.
    ///
    /// Generates the password and salt, derives the key material, and runs
    /// the session + block exchange to completion, reconnecting within the
    /// configured retry policy. Returns the identifier, the revocation
    /// credential, and the password.
    pub async fn upload(
        &self,
        filename: &str,
        plaintext: &[u8],
        progress: &dyn ProgressSink,
    ) -> Result<UploadOutcome, TransferError> {
        let salt = Salt::random();
        let password = generate_password(self.config.password_length);
        let mut key = KeyMaterial::derive_with_profile(&password, &salt, self.config.key_profile)?;

        progress.update(ProgressUpdate::phase(Phase::EncryptingFilename));
        let encrypted_name = key.encrypt_filename(filename)?;

        let total = plaintext.len() as u64;
        let content_length = ciphertext_length(total);

        let mut state = UploadState::new();
        let mut policy = self.config.retry.clone();
        let mut queue: VecDeque<UploadAction> = VecDeque::new();
        let mut session_token: Option<SessionToken> = None;
        let mut outcome: Option<(FileId, RevocationToken)> = None;
        let mut failure: Option<TransferError> = None;

        drive(&mut state, &mut queue, UploadEvent::Start);

        loop {
            let Some(action) = queue.pop_front() else {
                match state {
                    UploadState::Completed => break,
                    UploadState::Failed => {
                        return Err(failure.take().unwrap_or(TransferError::ProtocolViolation(
                            "upload failed without detail".into(),
                        )))
                    }
                    _ => {}
                }
                // Nothing queued and not terminal: await the next host frame.
                let event = self.next_event(&mut outcome, &mut failure).await;
                drive(&mut state, &mut queue, event);
                continue;
            };

            match action {
                UploadAction::RequestSession => {
                    progress.update(ProgressUpdate::phase(Phase::CreatingSession));
                    let request = SessionRequest {
                        filename: encrypted_name.clone(),
                        salt,
                        content_length,
                    };
                    match self.api.create_session(&request).await {
                        Ok(grant) => {
                            session_token = Some(grant.session_token);
                            drive(&mut state, &mut queue, UploadEvent::SessionGranted);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "session creation failed");
                            failure = Some(TransferError::Api(e));
                            drive(&mut state, &mut queue, UploadEvent::Rejected { code: 0 });
                        }
                    }
                }

                UploadAction::OpenChannel => {
                    let Some(token) = session_token.as_ref() else {
                        return Err(TransferError::ProtocolViolation(
                            "channel opened before session grant".into(),
                        ));
                    };
                    match self.channel.connect(token.as_str()).await {
                        Ok(()) => drive(&mut state, &mut queue, UploadEvent::ChannelOpened),
                        Err(e) => {
                            tracing::warn!(error = %e, "upload channel connect failed");
                            drive(
                                &mut state,
                                &mut queue,
                                UploadEvent::ChannelLost {
                                    reason: e.to_string(),
                                },
                            );
                        }
                    }
                }

                UploadAction::EncryptAndSend { block } => {
                    let offset = block.saturating_mul(BLOCK_SIZE as u64);
                    if offset > total {
                        // The host is asking for data that does not exist;
                        // there is no way to recover from that.
                        failure = Some(TransferError::ProtocolViolation(
                            "host requested more data than anticipated".into(),
                        ));
                        drive(&mut state, &mut queue, UploadEvent::ProtocolViolated);
                        continue;
                    }
                    if block != u64::from(key.block_counter()) {
                        // Encrypting under a counter that disagrees with the
                        // requested index would produce ciphertext the
                        // receiver can never authenticate.
                        failure = Some(TransferError::ProtocolViolation(format!(
                            "host requested block {} but encryption counter is at {}",
                            block,
                            key.block_counter()
                        )));
                        drive(&mut state, &mut queue, UploadEvent::ProtocolViolated);
                        continue;
                    }

                    let start = offset as usize;
                    let end = (start + BLOCK_SIZE).min(plaintext.len());
                    let ciphertext = key.encrypt_block(&plaintext[start..end])?;

                    match self.channel.send_binary(&ciphertext).await {
                        Ok(()) => {
                            progress.update(ProgressUpdate::fraction(
                                Phase::Uploading,
                                offset as f64 / total.max(1) as f64,
                            ));
                            drive(&mut state, &mut queue, UploadEvent::BlockSent { block });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, block, "block send failed");
                            drive(
                                &mut state,
                                &mut queue,
                                UploadEvent::ChannelLost {
                                    reason: e.to_string(),
                                },
                            );
                        }
                    }
                }

                UploadAction::RollbackCounter => key.rollback_counter(),

                UploadAction::ResetRetries => policy.record_success(),

                UploadAction::StartBackoffTimer => match policy.next_delay() {
                    Some(delay) => {
                        progress.update(
                            ProgressUpdate::phase(Phase::Reconnecting)
                                .with_detail(format!("reconnecting in {}s", delay.as_secs())),
                        );
                        tokio::time::sleep(delay).await;
                        drive(&mut state, &mut queue, UploadEvent::BackoffElapsed);
                    }
                    None => {
                        failure = Some(TransferError::RetriesExhausted {
                            attempts: policy.max_attempts(),
                        });
                        drive(&mut state, &mut queue, UploadEvent::RetriesExhausted);
                    }
                },

                UploadAction::CloseChannel => {
                    let _ = self.channel.close().await;
                }
            }
        }

        let (uuid, revocation_token) = outcome.ok_or_else(|| {
            TransferError::ProtocolViolation("upload completed without identifier".into())
        })?;
        Ok(UploadOutcome {
            uuid,
            revocation_token,
            password,
        })
    }

    /// Await the next host frame and translate it into a machine event.
    async fn next_event(
        &self,
        outcome: &mut Option<(FileId, RevocationToken)>,
        failure: &mut Option<TransferError>,
    ) -> UploadEvent {
        match self.channel.recv().await {
            Ok(Frame::Text(text)) => match UploadControl::from_json(&text) {
                Ok(UploadControl::NeedBlock { block }) => {
                    tracing::debug!(block, "host requested block");
                    UploadEvent::BlockRequested { block }
                }
                Ok(UploadControl::Complete {
                    uuid,
                    revocation_token,
                }) => {
                    tracing::debug!(%uuid, "upload complete");
                    *outcome = Some((uuid, revocation_token));
                    UploadEvent::UploadComplete
                }
                Ok(UploadControl::Rejected { code, detail }) => {
                    tracing::error!(code, %detail, "host rejected upload");
                    *failure = Some(TransferError::Rejected { code, detail });
                    UploadEvent::Rejected { code }
                }
                Err(e) => {
                    *failure = Some(TransferError::Frame(e));
                    UploadEvent::ProtocolViolated
                }
            },
            Ok(Frame::Binary(_)) => {
                *failure = Some(TransferError::ProtocolViolation(
                    "unexpected binary frame from host".into(),
                ));
                UploadEvent::ProtocolViolated
            }
            Err(e) => {
                tracing::warn!(error = %e, "upload channel lost");
                UploadEvent::ChannelLost {
                    reason: e.to_string(),
                }
            }
        }
    }
}

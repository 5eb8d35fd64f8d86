//! Transfer state machines for f.bain uploads and downloads.
//!
//! This module provides pure, side-effect-free state machines for the two
//! transfer directions. Each machine takes events as input and produces a
//! new state plus a list of actions to execute.
//!
//! The actual I/O (opening channels, encrypting, sending frames) is performed
//! by fbain-client, not by this module. This enables instant unit testing
//! without network mocks. The retry bound and backoff delay live in the
//! interpreter's [`RetryPolicy`](crate::RetryPolicy): when a machine emits
//! `StartBackoffTimer`, the interpreter either sleeps and feeds
//! `BackoffElapsed` or, with the policy exhausted, feeds `RetriesExhausted`.

/// Upload lifecycle state machine - NO I/O, just state transitions.
///
/// The host drives the block exchange: after the channel opens the machine
/// sits in `AwaitingBlockRequest` until the host asks for a block, moves to
/// `Sending` while the block is encrypted and transmitted, and returns. Any
/// channel loss before completion passes through `ReconnectPending`, rolling
/// back the in-flight block counter so the retried block reuses its nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    /// Nothing requested yet.
    Idle,
    /// Session creation request is in flight.
    SessionRequested,
    /// Channel connection attempt in progress.
    Connecting {
        /// How many reconnection attempts preceded this one (0 = first connect).
        attempt: u32,
    },
    /// Connected, waiting for the host to request a block.
    AwaitingBlockRequest,
    /// Encrypting and transmitting one block.
    Sending {
        /// Zero-based index of the block being sent.
        block: u64,
    },
    /// Channel lost, waiting out the backoff delay.
    ReconnectPending {
        /// Number of the reconnection attempt this wait precedes.
        attempt: u32,
    },
    /// Terminal success: the host confirmed storage.
    Completed,
    /// Terminal failure.
    Failed,
}

impl UploadState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (fbain-client)
    /// is responsible for executing the returned actions. Invalid
    /// (state, event) pairs keep the state and produce no actions.
    pub fn on_event(self, event: UploadEvent) -> (Self, Vec<UploadAction>) {
        match (self, event) {
            // From Idle
            (Self::Idle, UploadEvent::Start) => {
                (Self::SessionRequested, vec![UploadAction::RequestSession])
            }

            // From SessionRequested
            (Self::SessionRequested, UploadEvent::SessionGranted) => (
                Self::Connecting { attempt: 0 },
                vec![UploadAction::OpenChannel],
            ),
            (Self::SessionRequested, UploadEvent::Rejected { .. }) => (Self::Failed, vec![]),

            // From Connecting
            (Self::Connecting { .. }, UploadEvent::ChannelOpened) => {
                (Self::AwaitingBlockRequest, vec![])
            }
            (Self::Connecting { attempt }, UploadEvent::ChannelLost { .. }) => (
                Self::ReconnectPending {
                    attempt: attempt.saturating_add(1),
                },
                vec![
                    UploadAction::RollbackCounter,
                    UploadAction::StartBackoffTimer,
                ],
            ),

            // From AwaitingBlockRequest. A block request is the first proof
            // the reconnected host is actually talking to us, so it, not the
            // bare connect, resets the retry budget.
            (Self::AwaitingBlockRequest, UploadEvent::BlockRequested { block }) => (
                Self::Sending { block },
                vec![
                    UploadAction::ResetRetries,
                    UploadAction::EncryptAndSend { block },
                ],
            ),
            (Self::AwaitingBlockRequest, UploadEvent::UploadComplete) => {
                (Self::Completed, vec![UploadAction::CloseChannel])
            }

            // From Sending
            (Self::Sending { .. }, UploadEvent::BlockSent { .. }) => {
                (Self::AwaitingBlockRequest, vec![])
            }

            // Terminal host verdicts while the channel is up
            (Self::AwaitingBlockRequest | Self::Sending { .. }, UploadEvent::Rejected { .. }) => {
                (Self::Failed, vec![UploadAction::CloseChannel])
            }
            (
                Self::AwaitingBlockRequest | Self::Sending { .. },
                UploadEvent::ProtocolViolated,
            ) => (Self::Failed, vec![UploadAction::CloseChannel]),

            // Channel loss after a successful connect restarts the attempt count
            (
                Self::AwaitingBlockRequest | Self::Sending { .. },
                UploadEvent::ChannelLost { .. },
            ) => (
                Self::ReconnectPending { attempt: 1 },
                vec![
                    UploadAction::RollbackCounter,
                    UploadAction::StartBackoffTimer,
                ],
            ),

            // From ReconnectPending
            (Self::ReconnectPending { attempt }, UploadEvent::BackoffElapsed) => (
                Self::Connecting { attempt },
                vec![UploadAction::OpenChannel],
            ),
            (Self::ReconnectPending { .. }, UploadEvent::RetriesExhausted) => {
                (Self::Failed, vec![])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the machine reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl Default for UploadState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur during an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// The caller started the transfer.
    Start,
    /// The host granted a session token.
    SessionGranted,
    /// The channel connection succeeded.
    ChannelOpened,
    /// Host control frame: need block `block`.
    BlockRequested {
        /// Zero-based index of the requested block.
        block: u64,
    },
    /// One encrypted block was handed to the channel.
    BlockSent {
        /// Index of the block that was sent.
        block: u64,
    },
    /// Host control frame: upload complete.
    UploadComplete,
    /// The host rejected the transfer (session refusal or 401/414 frame).
    Rejected {
        /// Numeric rejection code, 0 for session creation failures.
        code: u16,
    },
    /// The host asked for data outside the agreed length.
    ProtocolViolated,
    /// The channel failed or closed before completion.
    ChannelLost {
        /// Reason for the loss.
        reason: String,
    },
    /// The backoff delay before a reconnect elapsed.
    BackoffElapsed,
    /// The retry policy is exhausted.
    RetriesExhausted,
}

/// Actions to be executed by the upload interpreter.
///
/// These are instructions, not side effects. fbain-client interprets them
/// and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadAction {
    /// Create an upload session over the REST API.
    RequestSession,
    /// Open (or reopen) the block channel for the session token.
    OpenChannel,
    /// Encrypt plaintext block `block` and transmit the ciphertext.
    EncryptAndSend {
        /// Zero-based index of the block to send.
        block: u64,
    },
    /// Roll back the in-flight block counter (guarded, idempotent).
    RollbackCounter,
    /// Reset the retry policy after a successful (re)connect.
    ResetRetries,
    /// Wait out the backoff delay, or give up if the policy is exhausted.
    StartBackoffTimer,
    /// Close the channel.
    CloseChannel,
}

/// Download lifecycle state machine - NO I/O, just state transitions.
///
/// The client drives the block exchange: after the status frame confirms the
/// file exists, the machine requests one encrypted block at a time and stays
/// in `Streaming` until the confirmed offset reaches the declared total. The
/// byte offset is carried through every state so a reconnect resumes exactly
/// at the last confirmed position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadState {
    /// Nothing requested yet.
    Idle,
    /// Channel connection attempt in progress.
    Connecting {
        /// How many reconnection attempts preceded this one (0 = first connect).
        attempt: u32,
        /// Last confirmed ciphertext offset.
        offset: u64,
    },
    /// Connected, waiting for the existence status frame.
    AwaitingStatus {
        /// Last confirmed ciphertext offset.
        offset: u64,
    },
    /// Receiving and decrypting blocks.
    Streaming {
        /// Last confirmed ciphertext offset.
        offset: u64,
    },
    /// Channel lost, waiting out the backoff delay.
    ReconnectPending {
        /// Number of the reconnection attempt this wait precedes.
        attempt: u32,
        /// Offset to resume from once reconnected.
        offset: u64,
    },
    /// Terminal success: all declared bytes received and decrypted.
    Completed,
    /// Terminal failure.
    Failed,
}

impl DownloadState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// Pure function; invalid (state, event) pairs keep the state and
    /// produce no actions.
    pub fn on_event(self, event: DownloadEvent) -> (Self, Vec<DownloadAction>) {
        match (self, event) {
            // From Idle
            (Self::Idle, DownloadEvent::Start) => (
                Self::Connecting {
                    attempt: 0,
                    offset: 0,
                },
                vec![DownloadAction::OpenChannel],
            ),

            // From Connecting
            (Self::Connecting { offset, .. }, DownloadEvent::ChannelOpened) => {
                (Self::AwaitingStatus { offset }, vec![])
            }
            (Self::Connecting { attempt, offset }, DownloadEvent::ChannelLost { .. }) => (
                Self::ReconnectPending {
                    attempt: attempt.saturating_add(1),
                    offset,
                },
                vec![DownloadAction::StartBackoffTimer],
            ),

            // From AwaitingStatus. The status frame is the first proof the
            // reconnected host is actually talking to us, so it, not the
            // bare connect, resets the retry budget. The first read of a
            // connection announces its offset so a resumed download
            // continues where it left off.
            (Self::AwaitingStatus { offset }, DownloadEvent::StatusOk) => (
                Self::Streaming { offset },
                vec![
                    DownloadAction::ResetRetries,
                    DownloadAction::RequestRead {
                        seek: Some(offset),
                    },
                ],
            ),
            (Self::AwaitingStatus { .. }, DownloadEvent::NotFound) => {
                (Self::Failed, vec![DownloadAction::CloseChannel])
            }
            (Self::AwaitingStatus { offset }, DownloadEvent::ChannelLost { .. }) => (
                Self::ReconnectPending { attempt: 1, offset },
                vec![DownloadAction::StartBackoffTimer],
            ),

            // From Streaming
            (Self::Streaming { .. }, DownloadEvent::BlockDecrypted { offset, total })
                if offset >= total =>
            {
                (Self::Completed, vec![DownloadAction::CloseChannel])
            }
            (Self::Streaming { .. }, DownloadEvent::BlockDecrypted { offset, .. }) => (
                Self::Streaming { offset },
                vec![DownloadAction::RequestRead { seek: None }],
            ),
            // Authentication failures can never become valid by re-requesting
            // the same span, so there is no retry path from here.
            (Self::Streaming { .. }, DownloadEvent::AuthenticationFailed) => {
                (Self::Failed, vec![DownloadAction::CloseChannel])
            }
            (
                Self::Streaming { .. } | Self::AwaitingStatus { .. },
                DownloadEvent::ProtocolViolated,
            ) => (Self::Failed, vec![DownloadAction::CloseChannel]),
            (Self::Streaming { offset }, DownloadEvent::ChannelLost { .. }) => (
                Self::ReconnectPending { attempt: 1, offset },
                vec![DownloadAction::StartBackoffTimer],
            ),

            // From ReconnectPending
            (Self::ReconnectPending { attempt, offset }, DownloadEvent::BackoffElapsed) => (
                Self::Connecting { attempt, offset },
                vec![DownloadAction::OpenChannel],
            ),
            (Self::ReconnectPending { .. }, DownloadEvent::RetriesExhausted) => {
                (Self::Failed, vec![])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the machine reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl Default for DownloadState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur during a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// The caller started the transfer.
    Start,
    /// The channel connection succeeded.
    ChannelOpened,
    /// Status frame: the file exists.
    StatusOk,
    /// Status frame: no such file. Terminal, never retried.
    NotFound,
    /// One block was decrypted and appended to the output.
    BlockDecrypted {
        /// New confirmed ciphertext offset after the append.
        offset: u64,
        /// Declared total ciphertext length.
        total: u64,
    },
    /// A block failed authentication. Terminal, never retried.
    AuthenticationFailed,
    /// The host sent data outside the declared length.
    ProtocolViolated,
    /// The channel failed or closed before completion.
    ChannelLost {
        /// Reason for the loss.
        reason: String,
    },
    /// The backoff delay before a reconnect elapsed.
    BackoffElapsed,
    /// The retry policy is exhausted.
    RetriesExhausted,
}

/// Actions to be executed by the download interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadAction {
    /// Open (or reopen) the block channel for the file identifier.
    OpenChannel,
    /// Reset the retry policy after a successful (re)connect.
    ResetRetries,
    /// Send a read request for the next encrypted block.
    RequestRead {
        /// Explicit resume offset for the first request of a connection.
        seek: Option<u64>,
    },
    /// Wait out the backoff delay, or give up if the policy is exhausted.
    StartBackoffTimer,
    /// Close the channel.
    CloseChannel,
}

//! Synchronous progress reporting.
//!
//! Transfers report progress through a single-method sink invoked inline by
//! the component doing the work; there is no event loop and no callback
//! registration. Callers that do not care pass [`NullSink`].

/// The phase a transfer is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Encrypting the filename before session creation.
    EncryptingFilename,
    /// Creating the upload session over the REST API.
    CreatingSession,
    /// Streaming encrypted blocks to the host.
    Uploading,
    /// Fetching public metadata before a download.
    FetchingMetadata,
    /// Streaming and decrypting blocks from the host.
    Downloading,
    /// Waiting out a backoff delay before reconnecting.
    Reconnecting,
}

/// One structured progress update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Current phase.
    pub phase: Phase,
    /// Completed fraction of the transfer, if meaningful for the phase.
    pub fraction: Option<f64>,
    /// Free-form detail, e.g. a reconnect reason.
    pub detail: Option<String>,
}

impl ProgressUpdate {
    /// An update announcing a phase with no fraction.
    pub fn phase(phase: Phase) -> Self {
        Self {
            phase,
            fraction: None,
            detail: None,
        }
    }

    /// An update carrying a completed fraction.
    pub fn fraction(phase: Phase, fraction: f64) -> Self {
        Self {
            phase,
            fraction: Some(fraction),
            detail: None,
        }
    }

    /// Attach free-form detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Receiver for progress updates, invoked synchronously and inline.
pub trait ProgressSink: Send + Sync {
    /// Deliver one update.
    fn update(&self, update: ProgressUpdate);
}

/// A sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn update(&self, _update: ProgressUpdate) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Collector(Mutex<Vec<ProgressUpdate>>);

    impl ProgressSink for Collector {
        fn update(&self, update: ProgressUpdate) {
            self.0.lock().unwrap().push(update);
        }
    }

    #[test]
    fn updates_arrive_in_order() {
        let sink = Collector(Mutex::new(Vec::new()));

        sink.update(ProgressUpdate::phase(Phase::CreatingSession));
        sink.update(ProgressUpdate::fraction(Phase::Uploading, 0.5));

        let seen = sink.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].phase, Phase::CreatingSession);
        assert_eq!(seen[1].fraction, Some(0.5));
    }

    #[test]
    fn detail_is_attached() {
        let update =
            ProgressUpdate::phase(Phase::Reconnecting).with_detail("reconnecting in 10s");
        assert_eq!(update.detail.as_deref(), Some("reconnecting in 10s"));
    }

    #[test]
    fn null_sink_accepts_everything() {
        NullSink.update(ProgressUpdate::fraction(Phase::Downloading, 1.0));
    }
}

//! Transcoding engine seam
//!
//! The export pipeline drives the external transcoding engine through the
//! [`TranscodeEngine`] trait. The production implementation lives in
//! [`crate::export::ffmpeg`]; tests substitute scripted fakes.

use crate::export::types::ExportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Metadata of a source media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Frame rate
    pub fps: f64,

    /// Whether the file carries at least one audio stream
    pub has_audio: bool,

    /// Video codec name as reported by the prober
    pub codec: String,
}

/// One external transcoder invocation
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    /// Full argument list, inputs through output path
    pub args: Vec<String>,

    /// Expected output duration in seconds, when known, for progress mapping
    pub expected_duration: Option<f64>,
}

impl TranscodeJob {
    pub fn new(args: Vec<String>) -> Self {
        Self {
            args,
            expected_duration: None,
        }
    }

    pub fn with_duration(args: Vec<String>, duration: f64) -> Self {
        Self {
            args,
            expected_duration: Some(duration),
        }
    }
}

/// Callback for the encoder's self-reported elapsed output time (seconds)
pub type ProgressSink<'a> = Option<&'a (dyn Fn(f64) + Send + Sync)>;

/// Cooperative cancellation token shared between an [`crate::export::pipeline::ExportHandle`]
/// and the engine invocation currently in flight.
///
/// Cancelling sets a flag and wakes any waiter; the engine terminates its
/// subprocess and returns [`ExportError::Cancelled`].
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            // Re-check after arming the waiter so a cancel between the first
            // check and `notified()` cannot be missed.
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Bail out with [`ExportError::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<(), ExportError> {
        if self.is_cancelled() {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// External transcoding engine capabilities required by the export pipeline.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Query duration, resolution, frame rate, codec and audio-stream
    /// presence of a media file.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ExportError>;

    /// Run one transcoder invocation to completion.
    ///
    /// Implementations terminate the subprocess and return
    /// [`ExportError::Cancelled`] when `token` fires. `on_progress` receives
    /// the encoder's self-reported elapsed output time in seconds.
    async fn run(
        &self,
        job: TranscodeJob,
        token: &CancelToken,
        on_progress: ProgressSink<'_>,
    ) -> Result<(), ExportError>;
}

#[async_trait]
impl<T: TranscodeEngine + ?Sized> TranscodeEngine for Arc<T> {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ExportError> {
        (**self).probe(path).await
    }

    async fn run(
        &self,
        job: TranscodeJob,
        token: &CancelToken,
        on_progress: ProgressSink<'_>,
    ) -> Result<(), ExportError> {
        (**self).run(job, token, on_progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn token_starts_clear_and_latches() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(ExportError::Cancelled)));
    }

    #[tokio::test]
    async fn cancelled_future_resolves_after_cancel() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let task = tokio::spawn(async move { waiter.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter should wake")
            .expect("waiter task should not panic");
    }

    #[tokio::test]
    async fn cancelled_future_resolves_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already-cancelled token should not block");
    }
}

//! Voice output contract and the timed sink
//!
//! Playback is one buffer at a time; `stop()` interrupts the buffer
//! currently playing (hard stop, no fade) and `play` reports whether the
//! buffer completed or was stopped.

use async_trait::async_trait;
use tokio::sync::Notify;
use voice_relay_core::{AudioBuffer, PlaybackError};

/// How one playback call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Buffer streamed to the end.
    Completed,
    /// Interrupted by `stop()`.
    Stopped,
}

/// Voice output contract.
#[async_trait]
pub trait VoiceOutput: Send + Sync {
    /// Stream one buffer; returns when it finishes or is stopped.
    async fn play(&self, audio: &AudioBuffer) -> Result<PlayOutcome, PlaybackError>;

    /// Hard-stop the buffer currently playing, if any. No effect when idle.
    fn stop(&self);
}

/// Output that "plays" a buffer by waiting out its real duration.
///
/// Stands in for the Discord voice transport: timing-accurate, supports hard
/// stop, produces no sound. Used by the binary when no transport is wired
/// and by the pipeline tests.
#[derive(Debug, Default)]
pub struct TimedSink {
    interrupt: Notify,
}

impl TimedSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoiceOutput for TimedSink {
    async fn play(&self, audio: &AudioBuffer) -> Result<PlayOutcome, PlaybackError> {
        tokio::select! {
            _ = tokio::time::sleep(audio.duration()) => Ok(PlayOutcome::Completed),
            _ = self.interrupt.notified() => Ok(PlayOutcome::Stopped),
        }
    }

    fn stop(&self) {
        // notify_waiters wakes only a play() in progress; a stop while idle
        // does not leak into the next buffer.
        self.interrupt.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn completes_after_duration() {
        let sink = TimedSink::new();
        let audio = AudioBuffer::silence(Duration::from_millis(20), 48000);
        let outcome = sink.play(&audio).await.unwrap();
        assert_eq!(outcome, PlayOutcome::Completed);
    }

    #[tokio::test]
    async fn stop_interrupts_playback() {
        let sink = Arc::new(TimedSink::new());
        let audio = AudioBuffer::silence(Duration::from_secs(5), 48000);

        let stopper = Arc::clone(&sink);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            stopper.stop();
        });

        let outcome = sink.play(&audio).await.unwrap();
        assert_eq!(outcome, PlayOutcome::Stopped);
    }

    #[tokio::test]
    async fn stop_while_idle_does_not_affect_next_play() {
        let sink = TimedSink::new();
        sink.stop();
        let audio = AudioBuffer::silence(Duration::from_millis(10), 48000);
        assert_eq!(sink.play(&audio).await.unwrap(), PlayOutcome::Completed);
    }
}

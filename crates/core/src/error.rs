//! Boundary error types
//!
//! Chunk-level failures are isolated: a failed synthesis drops one chunk and
//! the group continues. Only the voice transport escalates to a fatal
//! pipeline condition, and that policy lives in the pipeline crate.

use thiserror::Error;

use crate::audio::AudioError;

/// Rejection of a message before it enters the pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("message is empty after normalization")]
    EmptyInput,
}

/// Failure of one synthesis call against the TTS engine.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("engine request timed out")]
    Timeout,

    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("engine returned HTTP {0}")]
    EngineStatus(u16),

    #[error("malformed audio: {0}")]
    MalformedAudio(#[from] AudioError),

    #[error("audio too large: {0} bytes")]
    AudioTooLarge(usize),
}

/// Failure of the voice output transport while playing one buffer.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("voice output failed: {0}")]
    Output(String),

    #[error("voice output is disconnected")]
    Disconnected,
}

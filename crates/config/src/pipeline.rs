//! Pipeline configuration

use serde::{Deserialize, Serialize};

/// Knobs for the chunking/synthesis/playback pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Maximum characters per chunk; longer messages split at sentence
    /// boundaries.
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Capacity of the synthesis queue (backpressure bound).
    #[serde(default = "default_synthesis_queue_size")]
    pub synthesis_queue_size: usize,

    /// Chunks synthesized ahead of the current playback position.
    #[serde(default = "default_lookahead_chunks")]
    pub lookahead_chunks: usize,

    /// Parallel synthesizer workers.
    #[serde(default = "default_synthesis_workers")]
    pub synthesis_workers: usize,

    /// Timeout for one engine synthesis call, in seconds.
    #[serde(default = "default_synthesis_timeout")]
    pub synthesis_timeout_secs: u64,

    /// Maximum accepted size of one synthesized buffer, in bytes.
    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: usize,

    /// Consecutive voice-output failures before the pipeline is considered
    /// dead.
    #[serde(default = "default_max_playback_failures")]
    pub max_consecutive_playback_failures: u32,

    /// Recent message hashes kept for duplicate suppression.
    #[serde(default = "default_dedup_history")]
    pub dedup_history: usize,
}

fn default_max_chunk_chars() -> usize {
    500
}
fn default_synthesis_queue_size() -> usize {
    100
}
fn default_lookahead_chunks() -> usize {
    3
}
fn default_synthesis_workers() -> usize {
    2
}
fn default_synthesis_timeout() -> u64 {
    10
}
fn default_max_audio_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_max_playback_failures() -> u32 {
    5
}
fn default_dedup_history() -> usize {
    100
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            synthesis_queue_size: default_synthesis_queue_size(),
            lookahead_chunks: default_lookahead_chunks(),
            synthesis_workers: default_synthesis_workers(),
            synthesis_timeout_secs: default_synthesis_timeout(),
            max_audio_bytes: default_max_audio_bytes(),
            max_consecutive_playback_failures: default_max_playback_failures(),
            dedup_history: default_dedup_history(),
        }
    }
}

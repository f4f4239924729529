//! Audio pipeline for the voice relay
//!
//! Two bounded queues decouple network-bound synthesis from real-time
//! playback:
//! - Chunker splits a message into sentence-bounded chunks under one group
//! - Synthesizer workers pull chunks, call the TTS engine in parallel under
//!   a lookahead bound, and hand results to the sequencer
//! - The sequencer restores global arrival order before the audio queue
//! - A single playback worker streams buffers gap-free and honors skip
//!
//! Groups (one per source message) can be skipped atomically at any stage
//! through the group tracker.

pub mod chunker;
pub mod normalize;
pub mod playback;
pub mod relay;
pub mod sequencer;
pub mod stats;
pub mod synthesizer;
pub mod tracker;

pub use chunker::chunk_text;
pub use normalize::normalize;
pub use relay::{EnqueueOutcome, Relay, RelayOptions, RelayStatus};
pub use sequencer::AudioItem;
pub use stats::{RelayStats, StatsSnapshot};
pub use tracker::{Cancelled, Cleared, GroupState, GroupTracker};

use thiserror::Error;

/// Pipeline errors surfaced on the control surface.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("message rejected: {0}")]
    Chunking(#[from] voice_relay_core::ChunkingError),

    #[error("synthesis queue is full")]
    Backpressure,

    #[error("pipeline is shut down")]
    Closed,

    #[error("voice output failed repeatedly: {0}")]
    PlaybackFatal(String),
}

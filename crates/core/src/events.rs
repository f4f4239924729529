//! Pipeline events
//!
//! Emitted per chunk for external observability collectors; the relay does
//! not define their storage or transport.

use serde::Serialize;

use crate::message::GroupId;

/// Per-chunk lifecycle events broadcast by the relay.
#[derive(Debug, Clone, Serialize)]
pub enum RelayEvent {
    /// Chunk accepted into the synthesis queue.
    ChunkQueued {
        group_id: GroupId,
        sequence_index: u32,
        total_in_group: u32,
    },
    /// Synthesis succeeded; audio is waiting for ordered release.
    ChunkSynthesized {
        group_id: GroupId,
        sequence_index: u32,
        bytes: usize,
        duration_ms: u64,
    },
    /// Chunk played to completion on the voice output.
    ChunkPlayed {
        group_id: GroupId,
        sequence_index: u32,
    },
    /// Synthesis or playback of the chunk failed; the group continues.
    ChunkFailed {
        group_id: GroupId,
        sequence_index: u32,
        reason: String,
    },
    /// Chunk discarded by a skip or clear, at whatever stage it was in.
    ChunkSkipped {
        group_id: GroupId,
        sequence_index: u32,
    },
    /// Last chunk of the group left the pipeline.
    GroupDone { group_id: GroupId },
}

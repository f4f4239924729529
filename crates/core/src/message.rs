//! Chunk and group types
//!
//! One source message becomes one group of ordered chunks. Groups are the
//! unit of skip/cancel; chunks are the unit of synthesis and playback.

use std::fmt;

use serde::Serialize;

/// Identifier for one source message's group of chunks.
///
/// Monotonic per relay instance, so ordering group ids orders groups by
/// message arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg_{}", self.0)
    }
}

/// A bounded-size slice of one source message, tagged for ordered playback.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Group (source message) this chunk belongs to.
    pub group_id: GroupId,
    /// 0-based position within the group.
    pub sequence_index: u32,
    /// Number of chunks in the group.
    pub total_in_group: u32,
    /// Global enqueue ordinal across all groups; playback follows this order.
    pub order: u64,
    /// Text to synthesize.
    pub text: String,
}

//! Group tracker
//!
//! Side table mapping each live group to its state and outstanding chunk
//! count. Both worker types consult it cooperatively: a group marked
//! skipping has its chunks discarded at the next stage boundary instead of
//! being ripped out of the queues. Entries are removed eagerly when the
//! last chunk leaves the pipeline.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use voice_relay_core::GroupId;

/// Lifecycle of a tracked group. `Done` is represented by removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Chunks queue, synthesize and play normally.
    Active,
    /// Skip requested; remaining chunks are discarded on sight.
    Skipping,
}

#[derive(Debug)]
struct GroupEntry {
    state: GroupState,
    outstanding: u32,
}

/// What `cancel` found, read under the same lock as the state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled {
    /// Chunks still in the pipeline at cancel time.
    pub chunks: u32,
    /// The group was on the voice output when the cancel landed.
    pub was_playing: bool,
}

/// Result of cancelling every tracked group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cleared {
    pub groups: u32,
    pub chunks: u32,
    /// Some cancelled group was on the voice output.
    pub playing_cancelled: bool,
}

#[derive(Debug, Default)]
struct Inner {
    groups: BTreeMap<GroupId, GroupEntry>,
    playing: Option<GroupId>,
}

/// Shared tracker; one per relay instance.
#[derive(Debug, Default)]
pub struct GroupTracker {
    inner: Mutex<Inner>,
}

impl GroupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a group with `total` chunks.
    pub fn register(&self, id: GroupId, total: u32) {
        debug_assert!(total > 0);
        let mut inner = self.inner.lock();
        inner.groups.insert(id, GroupEntry { state: GroupState::Active, outstanding: total });
    }

    /// Whether chunks of this group must be discarded. Unknown groups count
    /// as cancelled: their entry is gone, so nothing of theirs may play.
    pub fn is_cancelled(&self, id: GroupId) -> bool {
        let inner = self.inner.lock();
        match inner.groups.get(&id) {
            Some(entry) => entry.state == GroupState::Skipping,
            None => true,
        }
    }

    /// Mark a group skipping and report whether it was playing, in one
    /// critical section so the caller's stop decision cannot race the
    /// playback worker publishing the playing group. Zero chunks means the
    /// group was unknown or already skipping.
    pub fn cancel(&self, id: GroupId) -> Cancelled {
        let mut inner = self.inner.lock();
        let chunks = match inner.groups.get_mut(&id) {
            Some(entry) if entry.state == GroupState::Active => {
                entry.state = GroupState::Skipping;
                entry.outstanding
            }
            _ => 0,
        };
        Cancelled { chunks, was_playing: chunks > 0 && inner.playing == Some(id) }
    }

    /// Mark every tracked group skipping.
    pub fn cancel_all(&self) -> Cleared {
        let mut inner = self.inner.lock();
        let playing = inner.playing;
        let mut cleared = Cleared { groups: 0, chunks: 0, playing_cancelled: false };
        for (id, entry) in inner.groups.iter_mut() {
            if entry.state == GroupState::Active {
                entry.state = GroupState::Skipping;
                cleared.groups += 1;
                cleared.chunks += entry.outstanding;
                if playing == Some(*id) {
                    cleared.playing_cancelled = true;
                }
            }
        }
        cleared
    }

    /// Account one chunk leaving the pipeline (played, failed or skipped).
    /// Returns true when this was the group's last chunk and the entry was
    /// removed.
    pub fn chunk_finished(&self, id: GroupId) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.groups.get_mut(&id) else {
            return false;
        };
        entry.outstanding = entry.outstanding.saturating_sub(1);
        if entry.outstanding == 0 {
            inner.groups.remove(&id);
            if inner.playing == Some(id) {
                inner.playing = None;
            }
            true
        } else {
            false
        }
    }

    /// Publish `id` as the group on the voice output, refusing when the
    /// group is cancelled or gone. Checking and publishing under one lock
    /// means a concurrent `cancel` either sees the group playing or marks
    /// it skipping before this returns true, never neither.
    pub fn begin_playing(&self, id: GroupId) -> bool {
        let mut inner = self.inner.lock();
        match inner.groups.get(&id) {
            Some(entry) if entry.state == GroupState::Active => {
                inner.playing = Some(id);
                true
            }
            _ => false,
        }
    }

    /// Clear the playing group after the buffer ends.
    pub fn end_playing(&self) {
        self.inner.lock().playing = None;
    }

    pub fn playing(&self) -> Option<GroupId> {
        self.inner.lock().playing
    }

    /// Group a skip command targets: the playing group, else the oldest
    /// still-active group.
    pub fn skip_target(&self) -> Option<GroupId> {
        let inner = self.inner.lock();
        if let Some(id) = inner.playing {
            if matches!(inner.groups.get(&id), Some(e) if e.state == GroupState::Active) {
                return Some(id);
            }
        }
        inner
            .groups
            .iter()
            .find(|(_, e)| e.state == GroupState::Active)
            .map(|(id, _)| *id)
    }

    /// Total chunks still inside the pipeline.
    pub fn outstanding_chunks(&self) -> u32 {
        self.inner.lock().groups.values().map(|e| e.outstanding).sum()
    }

    /// Number of tracked groups.
    pub fn group_count(&self) -> usize {
        self.inner.lock().groups.len()
    }
}

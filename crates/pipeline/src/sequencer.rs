//! Ordering stage between synthesis and playback
//!
//! Synthesis workers finish out of order. Each chunk carries a global
//! ordinal assigned at enqueue time; the sequencer buffers completed audio
//! in an ordinal-keyed map and releases items to the audio queue only when
//! everything before them has been released. Chunks that fail or are
//! discarded submit a gap for their ordinal so the cursor never stalls.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio::sync::OwnedSemaphorePermit;
use tracing::trace;
use voice_relay_core::{AudioBuffer, GroupId};

/// A synthesized chunk on its way to playback. Holds its lookahead permit
/// until the audio has been played or discarded.
pub struct AudioItem {
    pub group_id: GroupId,
    pub sequence_index: u32,
    pub total_in_group: u32,
    pub order: u64,
    pub audio: AudioBuffer,
    pub(crate) permit: Option<OwnedSemaphorePermit>,
}

impl std::fmt::Debug for AudioItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioItem")
            .field("group_id", &self.group_id)
            .field("sequence_index", &self.sequence_index)
            .field("order", &self.order)
            .field("bytes", &self.audio.len_bytes())
            .finish()
    }
}

type Slot = (u64, Option<AudioItem>);

/// Cloneable submission side handed to each synthesis worker.
#[derive(Clone)]
pub struct SequencerHandle {
    tx: mpsc::UnboundedSender<Slot>,
}

impl SequencerHandle {
    /// Submit a finished item under its ordinal.
    pub fn submit(&self, item: AudioItem) {
        let _ = self.tx.send((item.order, Some(item)));
    }

    /// Mark an ordinal as never producing audio.
    pub fn gap(&self, order: u64) {
        let _ = self.tx.send((order, None));
    }
}

/// Spawn the sequencer task. Released items flow into `audio_tx`; the send
/// blocks when the audio queue is full, which is the backpressure point
/// holding completed audio in the reorder buffer.
pub fn spawn(audio_tx: mpsc::Sender<AudioItem>) -> SequencerHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(rx, audio_tx));
    SequencerHandle { tx }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Slot>, audio_tx: mpsc::Sender<AudioItem>) {
    let mut pending: BTreeMap<u64, Option<AudioItem>> = BTreeMap::new();
    let mut next_order: u64 = 0;

    while let Some((order, item)) = rx.recv().await {
        debug_assert!(order >= next_order, "ordinal {order} submitted twice");
        pending.insert(order, item);

        while let Some(slot) = pending.remove(&next_order) {
            next_order += 1;
            match slot {
                Some(item) => {
                    trace!(order = item.order, group = %item.group_id, "audio released in order");
                    if audio_tx.send(item).await.is_err() {
                        return;
                    }
                }
                None => trace!(order = next_order - 1, "gap consumed"),
            }
        }
    }
}

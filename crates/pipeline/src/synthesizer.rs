//! Synthesis worker pool
//!
//! A fixed number of workers pull chunks off the shared synthesis queue and
//! call the TTS engine concurrently. The lookahead semaphore caps how many
//! chunks may exist as synthesized-but-unplayed audio; a worker takes a
//! permit before it takes a chunk, and the permit travels with the audio
//! until playback drops it. Engine failures skip the chunk and the pool
//! keeps running.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::{debug, warn};
use voice_relay_core::{Chunk, RelayEvent, SynthesisError};
use voice_relay_engine::TtsEngine;

use crate::sequencer::{AudioItem, SequencerHandle};
use crate::stats::RelayStats;
use crate::tracker::GroupTracker;

pub(crate) struct SynthWorker {
    pub id: usize,
    pub engine: Arc<dyn TtsEngine>,
    pub task_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Chunk>>>,
    pub lookahead: Arc<Semaphore>,
    pub sequencer: SequencerHandle,
    pub tracker: Arc<GroupTracker>,
    pub stats: Arc<RelayStats>,
    pub events: broadcast::Sender<RelayEvent>,
    pub synthesis_timeout: Duration,
    pub max_audio_bytes: usize,
}

impl SynthWorker {
    pub async fn run(self) {
        let mut consecutive_errors: u32 = 0;
        loop {
            // Permit first, chunk second. Workers block here in dequeue
            // order, so the K permits always cover the K oldest chunks and
            // the head of the reorder buffer can always make progress.
            let permit = match Arc::clone(&self.lookahead).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let chunk = {
                let mut rx = self.task_rx.lock().await;
                match rx.recv().await {
                    Some(chunk) => chunk,
                    None => return,
                }
            };

            if self.tracker.is_cancelled(chunk.group_id) {
                self.discard(&chunk);
                continue;
            }

            match self.synthesize(&chunk).await {
                Ok(audio) => {
                    consecutive_errors = 0;
                    if self.tracker.is_cancelled(chunk.group_id) {
                        self.discard(&chunk);
                        continue;
                    }
                    debug!(
                        worker = self.id,
                        group = %chunk.group_id,
                        index = chunk.sequence_index,
                        bytes = audio.len_bytes(),
                        "chunk synthesized"
                    );
                    let _ = self.events.send(RelayEvent::ChunkSynthesized {
                        group_id: chunk.group_id,
                        sequence_index: chunk.sequence_index,
                        bytes: audio.len_bytes(),
                        duration_ms: audio.duration().as_millis() as u64,
                    });
                    self.sequencer.submit(AudioItem {
                        group_id: chunk.group_id,
                        sequence_index: chunk.sequence_index,
                        total_in_group: chunk.total_in_group,
                        order: chunk.order,
                        audio,
                        permit: Some(permit),
                    });
                }
                Err(err) => {
                    consecutive_errors += 1;
                    warn!(
                        worker = self.id,
                        group = %chunk.group_id,
                        index = chunk.sequence_index,
                        consecutive = consecutive_errors,
                        error = %err,
                        "synthesis failed, skipping chunk"
                    );
                    self.stats.record_error();
                    let _ = self.events.send(RelayEvent::ChunkFailed {
                        group_id: chunk.group_id,
                        sequence_index: chunk.sequence_index,
                        reason: err.to_string(),
                    });
                    self.finish(&chunk);
                }
            }
        }
    }

    async fn synthesize(&self, chunk: &Chunk) -> Result<voice_relay_core::AudioBuffer, SynthesisError> {
        let audio = tokio::time::timeout(self.synthesis_timeout, self.engine.synthesize(&chunk.text))
            .await
            .map_err(|_| SynthesisError::Timeout)??;
        if audio.len_bytes() > self.max_audio_bytes {
            return Err(SynthesisError::AudioTooLarge(audio.len_bytes()));
        }
        Ok(audio)
    }

    fn discard(&self, chunk: &Chunk) {
        let _ = self.events.send(RelayEvent::ChunkSkipped {
            group_id: chunk.group_id,
            sequence_index: chunk.sequence_index,
        });
        self.finish(chunk);
    }

    fn finish(&self, chunk: &Chunk) {
        // Failed and discarded chunks still occupy an ordinal.
        self.sequencer.gap(chunk.order);
        if self.tracker.chunk_finished(chunk.group_id) {
            let _ = self.events.send(RelayEvent::GroupDone { group_id: chunk.group_id });
        }
    }
}

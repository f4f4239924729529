//! Playback worker
//!
//! Single consumer of the audio queue. Plays one buffer at a time on the
//! voice output, honors skips both before and during a buffer, and counts
//! consecutive output failures so a dead voice connection surfaces as a
//! fatal pipeline error instead of a silent spin.
//!
//! Skip delivery is level triggered: the worker snapshots the skip signal
//! version before publishing the playing group, so a skip that lands
//! between publication and the first poll of `play()` still interrupts the
//! buffer instead of vanishing into a missed wakeup.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, warn};
use voice_relay_core::RelayEvent;
use voice_relay_engine::{PlayOutcome, VoiceOutput};

use crate::sequencer::AudioItem;
use crate::stats::RelayStats;
use crate::tracker::GroupTracker;
use crate::PipelineError;

pub(crate) struct PlaybackWorker {
    pub output: Arc<dyn VoiceOutput>,
    pub audio_rx: mpsc::Receiver<AudioItem>,
    pub tracker: Arc<GroupTracker>,
    pub stats: Arc<RelayStats>,
    pub events: broadcast::Sender<RelayEvent>,
    pub skip_signal: watch::Receiver<u64>,
    pub max_consecutive_failures: u32,
}

impl PlaybackWorker {
    pub async fn run(mut self) -> Result<(), PipelineError> {
        let mut consecutive_failures: u32 = 0;

        while let Some(item) = self.audio_rx.recv().await {
            // Snapshot the signal version first: any skip of this group
            // after begin_playing bumps it and wakes the select below.
            self.skip_signal.borrow_and_update();
            if !self.tracker.begin_playing(item.group_id) {
                self.skip(&item);
                continue;
            }

            let outcome = tokio::select! {
                outcome = self.output.play(&item.audio) => outcome,
                _ = self.skip_signal.changed() => Ok(PlayOutcome::Stopped),
            };
            self.tracker.end_playing();

            match outcome {
                Ok(PlayOutcome::Completed) => {
                    consecutive_failures = 0;
                    // A skip may have landed in the final milliseconds of
                    // the buffer, after stop() could still catch it.
                    if self.tracker.is_cancelled(item.group_id) {
                        self.skip(&item);
                    } else {
                        debug!(group = %item.group_id, index = item.sequence_index, "chunk played");
                        self.stats.record_played();
                        let _ = self.events.send(RelayEvent::ChunkPlayed {
                            group_id: item.group_id,
                            sequence_index: item.sequence_index,
                        });
                        self.finish(&item);
                    }
                }
                Ok(PlayOutcome::Stopped) => {
                    consecutive_failures = 0;
                    self.skip(&item);
                }
                Err(err) => {
                    consecutive_failures += 1;
                    warn!(
                        group = %item.group_id,
                        index = item.sequence_index,
                        consecutive = consecutive_failures,
                        error = %err,
                        "playback failed, dropping chunk"
                    );
                    self.stats.record_error();
                    let _ = self.events.send(RelayEvent::ChunkFailed {
                        group_id: item.group_id,
                        sequence_index: item.sequence_index,
                        reason: err.to_string(),
                    });
                    self.finish(&item);
                    if consecutive_failures >= self.max_consecutive_failures {
                        error!(
                            failures = consecutive_failures,
                            "voice output failing repeatedly, stopping playback"
                        );
                        return Err(PipelineError::PlaybackFatal(err.to_string()));
                    }
                }
            }

            // Dropping the item here releases its lookahead permit.
        }
        Ok(())
    }

    fn skip(&self, item: &AudioItem) {
        let _ = self.events.send(RelayEvent::ChunkSkipped {
            group_id: item.group_id,
            sequence_index: item.sequence_index,
        });
        self.finish(item);
    }

    fn finish(&self, item: &AudioItem) {
        if self.tracker.chunk_finished(item.group_id) {
            let _ = self.events.send(RelayEvent::GroupDone { group_id: item.group_id });
        }
    }
}

//! Relay orchestrator
//!
//! Owns both queues and every worker task. Messages come in through
//! `enqueue_message`, are normalized, deduplicated, chunked and queued under
//! a fresh group; skip and clear act on whole groups through the tracker.
//! The playback worker's fate is watched so a dead voice output surfaces
//! through `finished()`.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch, Semaphore};
use tracing::{debug, info};
use voice_relay_core::{Chunk, ChunkingError, GroupId, RelayEvent};
use voice_relay_engine::{TtsEngine, VoiceOutput};

use crate::chunker::chunk_text;
use crate::normalize::normalize;
use crate::playback::PlaybackWorker;
use crate::sequencer;
use crate::stats::{RelayStats, StatsSnapshot};
use crate::synthesizer::SynthWorker;
use crate::tracker::GroupTracker;
use crate::PipelineError;

/// Tunables for one relay instance. Defaults mirror the shipped config.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Character budget per chunk.
    pub max_chunk_chars: usize,
    /// Capacity of the synthesis queue (chunks awaiting synthesis).
    pub queue_capacity: usize,
    /// Maximum synthesized-but-unplayed chunks.
    pub lookahead: usize,
    /// Synthesis worker count.
    pub workers: usize,
    /// Per-chunk synthesis deadline.
    pub synthesis_timeout: Duration,
    /// Reject synthesized audio larger than this.
    pub max_audio_bytes: usize,
    /// Consecutive playback failures before the pipeline gives up.
    pub max_consecutive_playback_failures: u32,
    /// Recent message hashes kept for duplicate suppression.
    pub dedup_window: usize,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            max_chunk_chars: 500,
            queue_capacity: 64,
            lookahead: 3,
            workers: 2,
            synthesis_timeout: Duration::from_secs(10),
            max_audio_bytes: 10 * 1024 * 1024,
            max_consecutive_playback_failures: 5,
            dedup_window: 100,
        }
    }
}

/// Result of an enqueue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Message accepted under `group_id`, split into `chunks` pieces.
    Queued { group_id: GroupId, chunks: u32 },
    /// Message matched a recently enqueued one and was dropped.
    Duplicate,
}

/// Point-in-time view for the control surface.
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    pub active_groups: usize,
    pub outstanding_chunks: u32,
    pub playing: Option<GroupId>,
    pub stats: StatsSnapshot,
}

struct EnqueueState {
    task_tx: Option<mpsc::Sender<Chunk>>,
    next_group: u64,
    next_order: u64,
    recent_hashes: VecDeque<u64>,
}

pub struct Relay {
    options: RelayOptions,
    output: Arc<dyn VoiceOutput>,
    tracker: Arc<GroupTracker>,
    stats: Arc<RelayStats>,
    events: broadcast::Sender<RelayEvent>,
    // Serializes ordinal assignment with queue insertion.
    enqueue: tokio::sync::Mutex<EnqueueState>,
    // Level-triggered interrupt for the buffer being played; bumped only
    // when a cancel hits the playing group.
    skip_signal: watch::Sender<u64>,
    playback_done: watch::Receiver<Option<Result<(), String>>>,
}

impl Relay {
    /// Spawn the worker tasks and return the running relay.
    pub fn new(
        engine: Arc<dyn TtsEngine>,
        output: Arc<dyn VoiceOutput>,
        options: RelayOptions,
    ) -> Self {
        let (task_tx, task_rx) = mpsc::channel::<Chunk>(options.queue_capacity);
        let (audio_tx, audio_rx) = mpsc::channel(options.lookahead.max(1));
        let (events, _) = broadcast::channel(256);

        let tracker = Arc::new(GroupTracker::new());
        let stats = Arc::new(RelayStats::default());
        let lookahead = Arc::new(Semaphore::new(options.lookahead.max(1)));
        // The workers hold the only submission handles; when the last one
        // drains out after shutdown the sequencer and playback tasks follow.
        let sequencer = sequencer::spawn(audio_tx);

        let task_rx = Arc::new(tokio::sync::Mutex::new(task_rx));
        for id in 0..options.workers.max(1) {
            let worker = SynthWorker {
                id,
                engine: Arc::clone(&engine),
                task_rx: Arc::clone(&task_rx),
                lookahead: Arc::clone(&lookahead),
                sequencer: sequencer.clone(),
                tracker: Arc::clone(&tracker),
                stats: Arc::clone(&stats),
                events: events.clone(),
                synthesis_timeout: options.synthesis_timeout,
                max_audio_bytes: options.max_audio_bytes,
            };
            tokio::spawn(worker.run());
        }

        let (skip_signal, skip_rx) = watch::channel(0);
        let playback = PlaybackWorker {
            output: Arc::clone(&output),
            audio_rx,
            tracker: Arc::clone(&tracker),
            stats: Arc::clone(&stats),
            events: events.clone(),
            skip_signal: skip_rx,
            max_consecutive_failures: options.max_consecutive_playback_failures,
        };
        let (done_tx, playback_done) = watch::channel(None);
        tokio::spawn(async move {
            let result = playback.run().await.map_err(|e| e.to_string());
            let _ = done_tx.send(Some(result));
        });

        info!(
            workers = options.workers,
            lookahead = options.lookahead,
            queue_capacity = options.queue_capacity,
            "relay started"
        );

        Self {
            options,
            output,
            tracker,
            stats,
            events,
            enqueue: tokio::sync::Mutex::new(EnqueueState {
                task_tx: Some(task_tx),
                next_group: 0,
                next_order: 0,
                recent_hashes: VecDeque::new(),
            }),
            skip_signal,
            playback_done,
        }
    }

    /// Normalize, chunk and queue one message. Blocks while the synthesis
    /// queue is full.
    pub async fn enqueue_message(&self, text: &str) -> Result<EnqueueOutcome, PipelineError> {
        let cleaned = normalize(text);
        if cleaned.is_empty() {
            return Err(ChunkingError::EmptyInput.into());
        }

        let mut state = self.enqueue.lock().await;
        let tx = state.task_tx.clone().ok_or(PipelineError::Closed)?;
        if self.is_duplicate(&mut state, &cleaned) {
            debug!("duplicate message dropped");
            return Ok(EnqueueOutcome::Duplicate);
        }

        let chunks = self.prepare_group(&mut state, &cleaned);
        let group_id = chunks[0].group_id;
        let total = chunks.len() as u32;
        for chunk in chunks {
            let _ = self.events.send(RelayEvent::ChunkQueued {
                group_id,
                sequence_index: chunk.sequence_index,
                total_in_group: total,
            });
            if tx.send(chunk).await.is_err() {
                // Workers are gone and nothing will play again.
                self.tracker.cancel(group_id);
                return Err(PipelineError::Closed);
            }
        }
        Ok(EnqueueOutcome::Queued { group_id, chunks: total })
    }

    /// Like `enqueue_message` but fails fast with `Backpressure` instead of
    /// waiting for queue space.
    pub async fn try_enqueue_message(&self, text: &str) -> Result<EnqueueOutcome, PipelineError> {
        let cleaned = normalize(text);
        if cleaned.is_empty() {
            return Err(ChunkingError::EmptyInput.into());
        }

        let mut state = self.enqueue.lock().await;
        let tx = state.task_tx.clone().ok_or(PipelineError::Closed)?;
        if self.is_duplicate(&mut state, &cleaned) {
            debug!("duplicate message dropped");
            return Ok(EnqueueOutcome::Duplicate);
        }

        let pieces = chunk_text(&cleaned, self.options.max_chunk_chars);
        let permits = match tx.try_reserve_many(pieces.len()) {
            Ok(permits) => permits,
            Err(mpsc::error::TrySendError::Full(())) => return Err(PipelineError::Backpressure),
            Err(mpsc::error::TrySendError::Closed(())) => return Err(PipelineError::Closed),
        };

        let chunks = self.assign_group(&mut state, pieces);
        let group_id = chunks[0].group_id;
        let total = chunks.len() as u32;
        for (permit, chunk) in permits.zip(chunks) {
            let _ = self.events.send(RelayEvent::ChunkQueued {
                group_id,
                sequence_index: chunk.sequence_index,
                total_in_group: total,
            });
            permit.send(chunk);
        }
        Ok(EnqueueOutcome::Queued { group_id, chunks: total })
    }

    fn is_duplicate(&self, state: &mut EnqueueState, cleaned: &str) -> bool {
        let mut hasher = DefaultHasher::new();
        cleaned.hash(&mut hasher);
        let digest = hasher.finish();
        if state.recent_hashes.contains(&digest) {
            return true;
        }
        state.recent_hashes.push_back(digest);
        while state.recent_hashes.len() > self.options.dedup_window {
            state.recent_hashes.pop_front();
        }
        false
    }

    fn prepare_group(&self, state: &mut EnqueueState, cleaned: &str) -> Vec<Chunk> {
        let pieces = chunk_text(cleaned, self.options.max_chunk_chars);
        self.assign_group(state, pieces)
    }

    fn assign_group(&self, state: &mut EnqueueState, pieces: Vec<String>) -> Vec<Chunk> {
        let group_id = GroupId(state.next_group);
        state.next_group += 1;
        let total = pieces.len() as u32;
        self.tracker.register(group_id, total);

        pieces
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let order = state.next_order;
                state.next_order += 1;
                Chunk {
                    group_id,
                    sequence_index: i as u32,
                    total_in_group: total,
                    order,
                    text,
                }
            })
            .collect()
    }

    /// Skip the playing group, or the oldest queued group when idle.
    /// Returns the number of chunks purged.
    pub fn skip_current(&self) -> u32 {
        let Some(target) = self.tracker.skip_target() else {
            return 0;
        };
        let cancelled = self.tracker.cancel(target);
        self.stats.record_skip();
        info!(group = %target, purged = cancelled.chunks, "group skipped");
        if cancelled.was_playing {
            self.interrupt_playback();
        }
        cancelled.chunks
    }

    /// Skip every group in the pipeline. Returns the number of chunks purged.
    pub fn clear_all(&self) -> u32 {
        let cleared = self.tracker.cancel_all();
        for _ in 0..cleared.groups {
            self.stats.record_skip();
        }
        if cleared.chunks > 0 {
            info!(purged = cleared.chunks, "pipeline cleared");
        }
        if cleared.playing_cancelled {
            self.interrupt_playback();
        }
        cleared.chunks
    }

    fn interrupt_playback(&self) {
        // The version bump reaches the playback worker even when stop()
        // fires before its play() future has registered for interruption.
        self.skip_signal.send_modify(|v| *v = v.wrapping_add(1));
        self.output.stop();
    }

    pub fn status(&self) -> RelayStatus {
        RelayStatus {
            active_groups: self.tracker.group_count(),
            outstanding_chunks: self.tracker.outstanding_chunks(),
            playing: self.tracker.playing(),
            stats: self.stats.snapshot(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Subscribe to per-chunk lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    /// Stop accepting messages; queued work drains normally.
    pub async fn shutdown(&self) {
        let mut state = self.enqueue.lock().await;
        if state.task_tx.take().is_some() {
            info!("relay shutting down, draining queues");
        }
    }

    /// Resolves when the playback worker exits: `Ok` after a drain-out
    /// shutdown, `Err` when the voice output failed fatally.
    pub async fn finished(&self) -> Result<(), PipelineError> {
        let mut done = self.playback_done.clone();
        loop {
            if let Some(result) = done.borrow_and_update().clone() {
                return result.map_err(PipelineError::PlaybackFatal);
            }
            if done.changed().await.is_err() {
                return Ok(());
            }
        }
    }
}

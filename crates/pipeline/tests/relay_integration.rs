//! End-to-end pipeline tests against the mock engine and timed sink.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;
use voice_relay_core::{GroupId, RelayEvent};
use voice_relay_engine::mock::MockEngine;
use voice_relay_engine::{TimedSink, VoiceOutput};
use voice_relay_pipeline::{EnqueueOutcome, PipelineError, Relay, RelayOptions};

const WAIT: Duration = Duration::from_secs(10);

fn fast_options() -> RelayOptions {
    RelayOptions {
        max_chunk_chars: 500,
        queue_capacity: 64,
        lookahead: 3,
        workers: 2,
        synthesis_timeout: Duration::from_secs(5),
        ..RelayOptions::default()
    }
}

fn relay_with(engine: MockEngine, options: RelayOptions) -> (Relay, Arc<TimedSink>) {
    let sink = Arc::new(TimedSink::new());
    let relay = Relay::new(Arc::new(engine), Arc::clone(&sink) as Arc<dyn VoiceOutput>, options);
    (relay, sink)
}

/// Drain events until `GroupDone` for `group`, returning everything seen.
async fn collect_until_done(
    rx: &mut broadcast::Receiver<RelayEvent>,
    group: GroupId,
) -> Vec<RelayEvent> {
    let mut events = Vec::new();
    loop {
        let event = timeout(WAIT, rx.recv()).await.expect("group never finished").unwrap();
        let done = matches!(event, RelayEvent::GroupDone { group_id } if group_id == group);
        events.push(event);
        if done {
            return events;
        }
    }
}

fn played_indexes(events: &[RelayEvent], group: GroupId) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            RelayEvent::ChunkPlayed { group_id, sequence_index } if *group_id == group => {
                Some(*sequence_index)
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn chunks_play_in_order_despite_uneven_synthesis_latency() {
    let engine = MockEngine::silent().with_audio_per_char(Duration::from_millis(1));
    // First chunk finishes last.
    engine.latency_on("一番。", Duration::from_millis(120));
    let (relay, _sink) = relay_with(
        engine,
        RelayOptions { max_chunk_chars: 3, workers: 4, lookahead: 4, ..fast_options() },
    );

    let mut rx = relay.subscribe();
    let outcome = relay.enqueue_message("一番。二番。三番。四番。").await.unwrap();
    let EnqueueOutcome::Queued { group_id, chunks } = outcome else {
        panic!("expected queued, got {outcome:?}");
    };
    assert_eq!(chunks, 4);

    let events = collect_until_done(&mut rx, group_id).await;
    assert_eq!(played_indexes(&events, group_id), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn groups_play_strictly_in_arrival_order() {
    let engine = MockEngine::silent().with_audio_per_char(Duration::from_millis(1));
    // The whole first group is slower to synthesize than the second.
    engine.latency_on("ゆっくりな文。", Duration::from_millis(100));
    let (relay, _sink) = relay_with(engine, fast_options());

    let mut rx = relay.subscribe();
    let first = relay.enqueue_message("ゆっくりな文。").await.unwrap();
    let second = relay.enqueue_message("はやい文。").await.unwrap();
    let EnqueueOutcome::Queued { group_id: g1, .. } = first else { panic!() };
    let EnqueueOutcome::Queued { group_id: g2, .. } = second else { panic!() };

    let events = collect_until_done(&mut rx, g2).await;
    let order: Vec<GroupId> = events
        .iter()
        .filter_map(|e| match e {
            RelayEvent::ChunkPlayed { group_id, .. } => Some(*group_id),
            _ => None,
        })
        .collect();
    assert_eq!(order, vec![g1, g2]);
}

#[tokio::test]
async fn skip_drops_every_remaining_chunk_of_the_playing_group() {
    // Long buffers so the skip lands mid-playback.
    let engine = MockEngine::silent().with_audio_per_char(Duration::from_millis(500));
    let (relay, _sink) = relay_with(
        engine,
        RelayOptions { max_chunk_chars: 4, ..fast_options() },
    );

    let mut rx = relay.subscribe();
    let first = relay.enqueue_message("長い一。長い二。長い三。").await.unwrap();
    let second = relay.enqueue_message("次の話。").await.unwrap();
    let EnqueueOutcome::Queued { group_id: g1, .. } = first else { panic!() };
    let EnqueueOutcome::Queued { group_id: g2, .. } = second else { panic!() };

    // Wait for playback of the first group to begin.
    timeout(WAIT, async {
        while relay.status().playing != Some(g1) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let purged = relay.skip_current();
    assert!(purged >= 1, "skip should purge the interrupted group");

    let events = collect_until_done(&mut rx, g2).await;
    assert!(played_indexes(&events, g1).is_empty(), "skipped group must not play");
    assert!(
        events.iter().any(|e| matches!(e, RelayEvent::GroupDone { group_id } if *group_id == g1)),
        "skipped group still reaches done"
    );
    assert_eq!(played_indexes(&events, g2), vec![0]);
    assert_eq!(relay.stats().groups_skipped, 1);
}

#[tokio::test]
async fn skip_while_idle_targets_oldest_queued_group() {
    // Engine slow enough that nothing has played when the skip arrives.
    let engine = MockEngine::silent().with_latency(Duration::from_millis(300));
    let (relay, _sink) = relay_with(engine, fast_options());

    let mut rx = relay.subscribe();
    let first = relay.enqueue_message("先の文。").await.unwrap();
    let second = relay.enqueue_message("後の文。").await.unwrap();
    let EnqueueOutcome::Queued { group_id: g1, .. } = first else { panic!() };
    let EnqueueOutcome::Queued { group_id: g2, .. } = second else { panic!() };

    assert_eq!(relay.skip_current(), 1);

    let events = collect_until_done(&mut rx, g2).await;
    assert!(played_indexes(&events, g1).is_empty());
    assert_eq!(played_indexes(&events, g2), vec![0]);
}

#[tokio::test]
async fn synthesized_unplayed_audio_never_exceeds_lookahead() {
    let lookahead = 2;
    // Instant synthesis, slow playback: pressure builds on the audio side.
    let engine = MockEngine::silent().with_audio_per_char(Duration::from_millis(40));
    let (relay, _sink) = relay_with(
        engine,
        RelayOptions { max_chunk_chars: 3, workers: 4, lookahead, ..fast_options() },
    );

    let mut rx = relay.subscribe();
    let outcome = relay.enqueue_message("甲。乙。丙。丁。戊。己。").await.unwrap();
    let EnqueueOutcome::Queued { group_id, chunks } = outcome else { panic!() };
    assert_eq!(chunks, 6);

    let events = collect_until_done(&mut rx, group_id).await;
    let mut in_flight: i64 = 0;
    for event in &events {
        match event {
            RelayEvent::ChunkSynthesized { .. } => {
                in_flight += 1;
                assert!(
                    in_flight <= lookahead as i64,
                    "synthesized-unplayed audio reached {in_flight}"
                );
            }
            RelayEvent::ChunkPlayed { .. } | RelayEvent::ChunkSkipped { .. } => in_flight -= 1,
            _ => {}
        }
    }
    assert_eq!(played_indexes(&events, group_id).len(), 6);
}

#[tokio::test]
async fn try_enqueue_reports_backpressure_when_queue_is_full() {
    // One stalled worker and a tiny queue.
    let engine = MockEngine::silent().with_latency(Duration::from_secs(30));
    let (relay, _sink) = relay_with(
        engine,
        RelayOptions { queue_capacity: 2, workers: 1, lookahead: 1, ..fast_options() },
    );

    // The worker can take at most one chunk and the queue holds two more,
    // so five distinct messages must hit the full queue.
    let mut saw_backpressure = false;
    for i in 0..5 {
        match relay.try_enqueue_message(&format!("メッセージ{i}番。")).await {
            Ok(EnqueueOutcome::Queued { .. }) => {}
            Err(PipelineError::Backpressure) => {
                saw_backpressure = true;
                break;
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert!(saw_backpressure, "full queue never reported backpressure");
}

#[tokio::test]
async fn failed_middle_chunk_does_not_stall_the_group() {
    let engine = MockEngine::silent().with_audio_per_char(Duration::from_millis(1));
    engine.fail_on("二番。");
    let (relay, _sink) = relay_with(
        engine,
        RelayOptions { max_chunk_chars: 3, ..fast_options() },
    );

    let mut rx = relay.subscribe();
    let outcome = relay.enqueue_message("一番。二番。三番。").await.unwrap();
    let EnqueueOutcome::Queued { group_id, .. } = outcome else { panic!() };

    let events = collect_until_done(&mut rx, group_id).await;
    assert_eq!(played_indexes(&events, group_id), vec![0, 2]);
    assert!(events.iter().any(|e| matches!(
        e,
        RelayEvent::ChunkFailed { sequence_index: 1, .. }
    )));
    assert_eq!(relay.stats().errors, 1);
}

#[tokio::test]
async fn synthesis_timeout_skips_the_chunk_and_playback_continues() {
    let engine = MockEngine::silent().with_audio_per_char(Duration::from_millis(1));
    engine.latency_on("遅延。", Duration::from_secs(30));
    let (relay, _sink) = relay_with(
        engine,
        RelayOptions {
            max_chunk_chars: 3,
            synthesis_timeout: Duration::from_millis(50),
            ..fast_options()
        },
    );

    let mut rx = relay.subscribe();
    let outcome = relay.enqueue_message("先頭。遅延。末尾。").await.unwrap();
    let EnqueueOutcome::Queued { group_id, .. } = outcome else { panic!() };

    let events = collect_until_done(&mut rx, group_id).await;
    assert_eq!(played_indexes(&events, group_id), vec![0, 2]);
    let timed_out = events.iter().any(|e| match e {
        RelayEvent::ChunkFailed { sequence_index: 1, reason, .. } => reason.contains("timed out"),
        _ => false,
    });
    assert!(timed_out, "middle chunk should fail with a timeout");
}

#[tokio::test]
async fn clear_all_empties_the_whole_pipeline() {
    let engine = MockEngine::silent().with_audio_per_char(Duration::from_millis(500));
    let (relay, _sink) = relay_with(engine, fast_options());

    let mut rx = relay.subscribe();
    let first = relay.enqueue_message("一通目の長い文。").await.unwrap();
    let second = relay.enqueue_message("二通目の長い文。").await.unwrap();
    let EnqueueOutcome::Queued { group_id: g1, .. } = first else { panic!() };
    let EnqueueOutcome::Queued { group_id: g2, .. } = second else { panic!() };

    timeout(WAIT, async {
        while relay.status().playing.is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(relay.clear_all() >= 1);

    let events = collect_until_done(&mut rx, g2).await;
    assert!(played_indexes(&events, g1).is_empty());
    assert!(played_indexes(&events, g2).is_empty());
    let status = relay.status();
    assert_eq!(status.active_groups, 0);
    assert_eq!(status.stats.chunks_played, 0);
    assert_eq!(status.stats.groups_skipped, 2);
}

#[tokio::test]
async fn duplicate_messages_are_suppressed() {
    let engine = MockEngine::silent();
    let (relay, _sink) = relay_with(engine, fast_options());

    let first = relay.enqueue_message("同じ内容です。").await.unwrap();
    assert!(matches!(first, EnqueueOutcome::Queued { .. }));
    let second = relay.enqueue_message("同じ内容です。").await.unwrap();
    assert_eq!(second, EnqueueOutcome::Duplicate);
}

#[tokio::test]
async fn unspeakable_message_is_rejected() {
    let engine = MockEngine::silent();
    let (relay, _sink) = relay_with(engine, fast_options());

    let err = relay.enqueue_message("** ** ``").await.unwrap_err();
    assert!(matches!(err, PipelineError::Chunking(_)));
}

#[tokio::test]
async fn typical_japanese_message_splits_and_plays_fully() {
    let engine = MockEngine::silent().with_audio_per_char(Duration::from_millis(1));
    let (relay, _sink) = relay_with(
        engine,
        RelayOptions { max_chunk_chars: 10, ..fast_options() },
    );

    let mut rx = relay.subscribe();
    let outcome = relay.enqueue_message("こんにちは。今日はいい天気ですね。").await.unwrap();
    let EnqueueOutcome::Queued { group_id, chunks } = outcome else { panic!() };
    assert_eq!(chunks, 2);

    let events = collect_until_done(&mut rx, group_id).await;
    assert_eq!(played_indexes(&events, group_id), vec![0, 1]);
    assert_eq!(relay.status().active_groups, 0);
    assert_eq!(relay.stats().chunks_played, 2);
}

#[tokio::test]
async fn shutdown_drains_queued_work_then_finishes() {
    let engine = MockEngine::silent().with_audio_per_char(Duration::from_millis(1));
    let (relay, _sink) = relay_with(engine, fast_options());

    let mut rx = relay.subscribe();
    let outcome = relay.enqueue_message("最後の挨拶。").await.unwrap();
    let EnqueueOutcome::Queued { group_id, .. } = outcome else { panic!() };
    relay.shutdown().await;

    assert!(matches!(
        relay.enqueue_message("もう遅い。").await,
        Err(PipelineError::Closed)
    ));

    let events = collect_until_done(&mut rx, group_id).await;
    assert_eq!(played_indexes(&events, group_id), vec![0]);
    timeout(WAIT, relay.finished()).await.unwrap().unwrap();
}

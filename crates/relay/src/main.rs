//! Voice relay entry point
//!
//! Reads messages on stdin, one per line, and speaks them through the
//! configured VOICEVOX-family engine. Lines starting with `/` are control
//! commands:
//!   /skip    drop the current message
//!   /clear   drop everything queued
//!   /status  print a pipeline status snapshot

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_relay_config::{load_settings, Settings};
use voice_relay_engine::{TimedSink, VoiceOutput, VoicevoxClient};
use voice_relay_pipeline::{PipelineError, Relay, RelayOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::var("VOICE_RELAY_ENV").ok();
    let settings = load_settings(env.as_deref())?;

    init_tracing(&settings);
    tracing::info!("Starting voice relay v{}", env!("CARGO_PKG_VERSION"));

    let (engine_url, speaker) = settings.engine.resolve()?;
    tracing::info!(engine = %settings.engine.name, url = %engine_url, speaker, "Engine selected");

    let synthesis_timeout = Duration::from_secs(settings.pipeline.synthesis_timeout_secs);
    let engine = Arc::new(VoicevoxClient::new(&engine_url, speaker, synthesis_timeout)?);
    match engine.check_availability().await {
        Ok(version) => tracing::info!(version = %version, "Engine reachable"),
        Err(err) => tracing::warn!(error = %err, "Engine not reachable yet, continuing anyway"),
    }

    let output: Arc<dyn VoiceOutput> = Arc::new(TimedSink::new());
    let relay = Arc::new(Relay::new(engine, output, relay_options(&settings)));

    let control = tokio::spawn(control_loop(Arc::clone(&relay)));

    tokio::select! {
        _ = shutdown_signal() => {
            relay.shutdown().await;
        }
        result = relay.finished() => {
            if let Err(err) = result {
                tracing::error!(error = %err, "Pipeline stopped");
                control.abort();
                return Err(err.into());
            }
        }
    }

    // Let queued audio finish before exiting.
    if let Err(err) = relay.finished().await {
        tracing::error!(error = %err, "Pipeline stopped during drain");
    }
    control.abort();
    tracing::info!("Relay shutdown complete");
    Ok(())
}

fn relay_options(settings: &Settings) -> RelayOptions {
    let p = &settings.pipeline;
    RelayOptions {
        max_chunk_chars: p.max_chunk_chars,
        queue_capacity: p.synthesis_queue_size,
        lookahead: p.lookahead_chunks,
        workers: p.synthesis_workers,
        synthesis_timeout: Duration::from_secs(p.synthesis_timeout_secs),
        max_audio_bytes: p.max_audio_bytes,
        max_consecutive_playback_failures: p.max_consecutive_playback_failures,
        dedup_window: p.dedup_history,
    }
}

/// Read stdin line by line, dispatching commands and queueing messages.
async fn control_loop(relay: Arc<Relay>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("stdin closed, draining pipeline");
                relay.shutdown().await;
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "stdin read failed");
                continue;
            }
        };

        let trimmed = line.trim();
        match trimmed {
            "" => {}
            "/skip" => {
                let purged = relay.skip_current();
                tracing::info!(purged, "skip requested");
            }
            "/clear" => {
                let purged = relay.clear_all();
                tracing::info!(purged, "clear requested");
            }
            "/status" => {
                let status = relay.status();
                tracing::info!(
                    active_groups = status.active_groups,
                    outstanding_chunks = status.outstanding_chunks,
                    playing = ?status.playing,
                    played = status.stats.chunks_played,
                    skipped = status.stats.groups_skipped,
                    errors = status.stats.errors,
                    "status"
                );
            }
            // Blocking enqueue: a full synthesis queue delays the next
            // stdin read instead of dropping the message.
            message => match relay.enqueue_message(message).await {
                Ok(outcome) => tracing::debug!(?outcome, "message enqueued"),
                Err(PipelineError::Closed) => return,
                Err(err) => tracing::warn!(error = %err, "message rejected"),
            },
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, draining pipeline"),
        _ = terminate => tracing::info!("Received SIGTERM, draining pipeline"),
    }
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("voice_relay={}", settings.observability.log_level).into()
    });

    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}

//! Mock TTS engine for tests
//!
//! Produces silence sized to the input text, with scriptable per-text
//! latency and failure so tests can force out-of-order completion and
//! engine faults.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use voice_relay_core::{AudioBuffer, SynthesisError};

use crate::TtsEngine;

#[derive(Debug, Clone, Default)]
struct Behavior {
    latency: Option<Duration>,
    fail: bool,
}

/// Scriptable in-memory engine.
pub struct MockEngine {
    sample_rate: u32,
    audio_per_char: Duration,
    default_latency: Duration,
    overrides: Mutex<HashMap<String, Behavior>>,
    synthesized: Mutex<Vec<String>>,
}

impl MockEngine {
    /// Engine that instantly returns silence (2ms of audio per character).
    pub fn silent() -> Self {
        Self {
            sample_rate: 24000,
            audio_per_char: Duration::from_millis(2),
            default_latency: Duration::ZERO,
            overrides: Mutex::new(HashMap::new()),
            synthesized: Mutex::new(Vec::new()),
        }
    }

    /// Latency applied to every call unless overridden per text.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    /// Audio duration produced per character of input.
    pub fn with_audio_per_char(mut self, per_char: Duration) -> Self {
        self.audio_per_char = per_char;
        self
    }

    /// Override the latency for one exact text.
    pub fn latency_on(&self, text: &str, latency: Duration) {
        self.overrides.lock().entry(text.to_string()).or_default().latency = Some(latency);
    }

    /// Fail synthesis for one exact text.
    pub fn fail_on(&self, text: &str) {
        self.overrides.lock().entry(text.to_string()).or_default().fail = true;
    }

    /// Texts synthesized so far, in completion order.
    pub fn synthesized(&self) -> Vec<String> {
        self.synthesized.lock().clone()
    }
}

#[async_trait]
impl TtsEngine for MockEngine {
    async fn synthesize(&self, text: &str) -> Result<AudioBuffer, SynthesisError> {
        let behavior = self.overrides.lock().get(text).cloned().unwrap_or_default();

        let latency = behavior.latency.unwrap_or(self.default_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if behavior.fail {
            return Err(SynthesisError::Unavailable("mock failure".to_string()));
        }

        self.synthesized.lock().push(text.to_string());
        let duration = self.audio_per_char * text.chars().count().max(1) as u32;
        Ok(AudioBuffer::silence(duration, self.sample_rate))
    }
}

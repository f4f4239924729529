//! Boundary contracts for the voice relay
//!
//! The relay core talks to two collaborators through traits: a TTS engine
//! that turns text into WAV buffers, and a voice output that streams one
//! buffer at a time and supports a hard stop. `VoicevoxClient` implements
//! the engine contract against the VOICEVOX/AivisSpeech HTTP API;
//! `TimedSink` is a duration-accurate output used by the binary and tests.

pub mod mock;
pub mod output;
pub mod voicevox;

pub use output::{PlayOutcome, TimedSink, VoiceOutput};
pub use voicevox::VoicevoxClient;

use async_trait::async_trait;
use voice_relay_core::{AudioBuffer, SynthesisError};

/// TTS engine contract: non-empty text in, playback-ready WAV out.
#[async_trait]
pub trait TtsEngine: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioBuffer, SynthesisError>;
}

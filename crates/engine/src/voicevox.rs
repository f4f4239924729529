//! VOICEVOX-compatible HTTP client
//!
//! Both VOICEVOX and AivisSpeech expose the same two-step API: POST
//! `/audio_query` returns a JSON synthesis plan, POST `/synthesis` turns
//! that plan into WAV bytes. The query body is passed through opaquely; the
//! relay never edits it.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use voice_relay_core::{AudioBuffer, SynthesisError};

use crate::TtsEngine;

/// Client for one VOICEVOX-style engine endpoint.
pub struct VoicevoxClient {
    http: reqwest::Client,
    base_url: String,
    speaker: u32,
}

impl VoicevoxClient {
    /// Build a client with a per-request timeout.
    pub fn new(base_url: &str, speaker: u32, timeout: Duration) -> Result<Self, SynthesisError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| SynthesisError::Unavailable(e.to_string()))?;

        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), speaker })
    }

    pub fn speaker(&self) -> u32 {
        self.speaker
    }

    /// Probe `/version`; returns the engine's version string.
    pub async fn check_availability(&self) -> Result<String, SynthesisError> {
        let resp = self
            .http
            .get(format!("{}/version", self.base_url))
            .send()
            .await
            .map_err(map_transport_error)?;

        if !resp.status().is_success() {
            return Err(SynthesisError::EngineStatus(resp.status().as_u16()));
        }
        resp.text().await.map_err(map_transport_error)
    }

    async fn audio_query(&self, text: &str) -> Result<String, SynthesisError> {
        let resp = self
            .http
            .post(format!("{}/audio_query", self.base_url))
            .query(&[("text", text), ("speaker", &self.speaker.to_string())])
            .send()
            .await
            .map_err(map_transport_error)?;

        if !resp.status().is_success() {
            return Err(SynthesisError::EngineStatus(resp.status().as_u16()));
        }
        resp.text().await.map_err(map_transport_error)
    }

    async fn synthesis(&self, query: String) -> Result<Vec<u8>, SynthesisError> {
        let resp = self
            .http
            .post(format!("{}/synthesis", self.base_url))
            .query(&[("speaker", &self.speaker.to_string())])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(query)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !resp.status().is_success() {
            return Err(SynthesisError::EngineStatus(resp.status().as_u16()));
        }
        Ok(resp.bytes().await.map_err(map_transport_error)?.to_vec())
    }
}

fn map_transport_error(err: reqwest::Error) -> SynthesisError {
    if err.is_timeout() {
        SynthesisError::Timeout
    } else {
        SynthesisError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl TtsEngine for VoicevoxClient {
    async fn synthesize(&self, text: &str) -> Result<AudioBuffer, SynthesisError> {
        let query = self.audio_query(text).await?;
        let wav = self.synthesis(query).await?;
        let audio = AudioBuffer::from_wav(wav)?;

        debug!(
            bytes = audio.len_bytes(),
            duration_ms = audio.duration().as_millis() as u64,
            "synthesized audio"
        );
        Ok(audio)
    }
}

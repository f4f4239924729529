//! Decoded audio buffers
//!
//! The TTS engine returns WAV data; the relay validates the header once at
//! the synthesis boundary and carries the buffer with its derived duration
//! so the playback stage never has to re-parse.

use std::time::Duration;

use thiserror::Error;

/// Canonical WAV header length assumed by the engine contract.
const WAV_HEADER_LEN: usize = 44;

const ALLOWED_SAMPLE_RATES: &[u32] = &[8000, 16000, 22050, 24000, 44100, 48000];
const ALLOWED_BITS: &[u16] = &[8, 16, 24, 32];

/// Audio validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AudioError {
    #[error("audio data too short ({0} bytes)")]
    TooShort(usize),

    #[error("not a RIFF/WAVE stream")]
    NotWave,

    #[error("unsupported format: {0} channels, {1} Hz, {2} bits")]
    UnsupportedFormat(u16, u32, u16),
}

/// A playback-ready WAV buffer with validated format.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    bytes: Vec<u8>,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    duration: Duration,
}

impl AudioBuffer {
    /// Validate WAV data and derive its duration.
    ///
    /// Assumes the canonical 44-byte header layout the engines emit; format
    /// fields are read at fixed offsets and checked against the sample
    /// rates and widths the voice transport accepts.
    pub fn from_wav(bytes: Vec<u8>) -> Result<Self, AudioError> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(AudioError::TooShort(bytes.len()));
        }
        if &bytes[..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(AudioError::NotWave);
        }

        let channels = u16::from_le_bytes([bytes[22], bytes[23]]);
        let sample_rate = u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]);
        let bits_per_sample = u16::from_le_bytes([bytes[34], bytes[35]]);

        if !(1..=2).contains(&channels)
            || !ALLOWED_SAMPLE_RATES.contains(&sample_rate)
            || !ALLOWED_BITS.contains(&bits_per_sample)
        {
            return Err(AudioError::UnsupportedFormat(channels, sample_rate, bits_per_sample));
        }

        let byte_rate = sample_rate as u64 * channels as u64 * (bits_per_sample as u64 / 8);
        let data_len = (bytes.len() - WAV_HEADER_LEN) as u64;
        let duration = Duration::from_nanos(data_len.saturating_mul(1_000_000_000) / byte_rate);

        Ok(Self { bytes, sample_rate, channels, bits_per_sample, duration })
    }

    /// Build a silent 16-bit mono buffer of the given duration.
    ///
    /// Used by mock engines in tests and by availability probes.
    pub fn silence(duration: Duration, sample_rate: u32) -> Self {
        let channels: u16 = 1;
        let bits: u16 = 16;
        let byte_rate = sample_rate * channels as u32 * (bits as u32 / 8);
        let data_len = (duration.as_nanos() * byte_rate as u128 / 1_000_000_000) as u32;
        // Keep sample alignment.
        let data_len = data_len - (data_len % 2);

        let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&byte_rate.to_le_bytes());
        bytes.extend_from_slice(&(channels * bits / 8).to_le_bytes());
        bytes.extend_from_slice(&bits.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(WAV_HEADER_LEN + data_len as usize, 0);

        Self::from_wav(bytes).expect("generated WAV header is canonical")
    }

    /// Raw WAV bytes, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total size in bytes.
    pub fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Playback duration derived from the data length.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }
}

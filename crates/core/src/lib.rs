//! Core types for the voice relay
//!
//! This crate provides foundational types used across all other crates:
//! - Chunk and group identifiers for ordered playback
//! - Decoded audio buffers with WAV validation
//! - Pipeline events
//! - Boundary error types

pub mod audio;
pub mod error;
pub mod events;
pub mod message;

pub use audio::{AudioBuffer, AudioError};
pub use error::{ChunkingError, PlaybackError, SynthesisError};
pub use events::RelayEvent;
pub use message::{Chunk, GroupId};

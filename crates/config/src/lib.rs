//! Configuration for the voice relay
//!
//! Settings are layered: `config/default.yaml`, an optional per-environment
//! file, then `VOICE_RELAY__*` environment variables (double underscore as
//! the section separator).

mod pipeline;
mod settings;

pub use pipeline::PipelineSettings;
pub use settings::{
    load_settings, EngineEndpoint, EngineSettings, ObservabilitySettings, Settings,
};

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

//! Main settings module

use std::collections::HashMap;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, PipelineSettings};

pub const DEFAULT_VOICEVOX_URL: &str = "http://localhost:50021";
pub const DEFAULT_AIVIS_URL: &str = "http://127.0.0.1:10101";

/// Main application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// TTS engine selection and endpoints
    #[serde(default)]
    pub engine: EngineSettings,

    /// Pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_chunk_chars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.max_chunk_chars".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.pipeline.lookahead_chunks == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.lookahead_chunks".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.pipeline.synthesis_workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.synthesis_workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.pipeline.synthesis_workers > self.pipeline.lookahead_chunks {
            // Workers park on lookahead permits before dequeueing, so extra
            // workers beyond the lookahead bound would never run.
            return Err(ConfigError::InvalidValue {
                field: "pipeline.synthesis_workers".to_string(),
                message: "must not exceed pipeline.lookahead_chunks".to_string(),
            });
        }
        self.engine.resolve()?;
        Ok(())
    }
}

/// One engine endpoint: base URL plus its speaker table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEndpoint {
    pub url: String,

    /// Speaker used when no named speaker is configured.
    pub default_speaker: u32,

    /// Named speaker presets for this engine.
    #[serde(default)]
    pub speakers: HashMap<String, u32>,
}

/// TTS engine selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Active engine name, key into `engines`.
    #[serde(default = "default_engine_name")]
    pub name: String,

    /// Named speaker preset; falls back to the engine's default speaker.
    #[serde(default = "default_speaker_label")]
    pub speaker: String,

    /// Known engines.
    #[serde(default = "default_engines")]
    pub engines: HashMap<String, EngineEndpoint>,
}

fn default_engine_name() -> String {
    "voicevox".to_string()
}

fn default_speaker_label() -> String {
    "normal".to_string()
}

fn default_engines() -> HashMap<String, EngineEndpoint> {
    let mut engines = HashMap::new();
    engines.insert(
        "voicevox".to_string(),
        EngineEndpoint {
            url: DEFAULT_VOICEVOX_URL.to_string(),
            default_speaker: 3,
            speakers: HashMap::from([
                ("normal".to_string(), 3),
                ("amai".to_string(), 1),
                ("sexy".to_string(), 5),
                ("tsun".to_string(), 7),
            ]),
        },
    );
    engines.insert(
        "aivis".to_string(),
        EngineEndpoint {
            url: DEFAULT_AIVIS_URL.to_string(),
            default_speaker: 1512153250,
            speakers: HashMap::from([
                ("anneli_normal".to_string(), 888753760),
                ("mai".to_string(), 1431611904),
                ("chuunibyou".to_string(), 604166016),
                ("zunda_normal".to_string(), 1512153250),
            ]),
        },
    );
    engines
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            speaker: default_speaker_label(),
            engines: default_engines(),
        }
    }
}

impl EngineSettings {
    /// Resolve the active engine to `(base_url, speaker_id)`.
    pub fn resolve(&self) -> Result<(String, u32), ConfigError> {
        let endpoint = self.engines.get(&self.name).ok_or_else(|| {
            let known: Vec<&str> = self.engines.keys().map(String::as_str).collect();
            ConfigError::InvalidValue {
                field: "engine.name".to_string(),
                message: format!("unknown engine '{}', known: {}", self.name, known.join(", ")),
            }
        })?;

        let speaker = match endpoint.speakers.get(&self.speaker) {
            Some(id) => *id,
            None => {
                if !self.speaker.is_empty() && self.speaker != default_speaker_label() {
                    tracing::warn!(
                        speaker = %self.speaker,
                        engine = %self.name,
                        "unknown speaker preset, using engine default"
                    );
                }
                endpoint.default_speaker
            }
        };

        Ok((endpoint.url.clone(), speaker))
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Log level for the default filter
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self { log_level: default_log_level(), log_json: false }
    }
}

/// Load settings from files and environment.
///
/// Priority (highest to lowest):
/// 1. Environment variables (`VOICE_RELAY` prefix)
/// 2. `config/{env}.yaml` (if env specified)
/// 3. `config/default.yaml`
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{env_name}")).required(false));
    }

    builder = builder
        .add_source(Environment::with_prefix("VOICE_RELAY").separator("__").try_parsing(true));

    let settings: Settings = builder.build()?.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.pipeline.max_chunk_chars, 500);
    }

    #[test]
    fn resolve_picks_named_speaker() {
        let mut engine = EngineSettings::default();
        engine.speaker = "amai".to_string();
        let (url, speaker) = engine.resolve().unwrap();
        assert_eq!(url, DEFAULT_VOICEVOX_URL);
        assert_eq!(speaker, 1);
    }

    #[test]
    fn resolve_falls_back_to_engine_default() {
        let mut engine = EngineSettings::default();
        engine.name = "aivis".to_string();
        engine.speaker = "does_not_exist".to_string();
        let (_, speaker) = engine.resolve().unwrap();
        assert_eq!(speaker, 1512153250);
    }

    #[test]
    fn unknown_engine_is_rejected() {
        let mut settings = Settings::default();
        settings.engine.name = "espeak".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_lookahead_is_rejected() {
        let mut settings = Settings::default();
        settings.pipeline.lookahead_chunks = 0;
        assert!(settings.validate().is_err());
    }
}

//! TOML configuration file loading
//!
//! Supports `~/.config/parlance/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParlanceConfigFile {
    /// Gemini API configuration
    #[serde(default)]
    pub gemini: GeminiFileConfig,

    /// Microphone configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Synthesis pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineFileConfig,

    /// Voice selection
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Gemini API settings
#[derive(Debug, Default, Deserialize)]
pub struct GeminiFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,

    /// Model for replies (e.g. "gemini-2.0-flash")
    pub chat_model: Option<String>,

    /// Model for transcription
    pub stt_model: Option<String>,

    /// Model for speech (e.g. "gemini-2.5-flash-preview-tts")
    pub tts_model: Option<String>,

    pub system_prompt: Option<String>,
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Seconds of audio captured per turn
    pub record_seconds: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PipelineFileConfig {
    /// Concurrent synthesis workers
    pub workers: Option<usize>,

    /// Per-sentence synthesis timeout in seconds
    pub synthesis_timeout_secs: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Starting voice (Kore, Charon, Fenrir, Aoede)
    pub default: Option<String>,
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the content is not valid TOML for this schema
pub fn parse_config_file(content: &str) -> Result<ParlanceConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `ParlanceConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ParlanceConfigFile {
    config_file_path().map_or_else(ParlanceConfigFile::default, |path| {
        load_config_file_from(&path)
    })
}

/// Load a config file from `path`, falling back to defaults
pub fn load_config_file_from(path: &Path) -> ParlanceConfigFile {
    if !path.exists() {
        return ParlanceConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ParlanceConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ParlanceConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/parlance/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parlance").join("config.toml"))
}

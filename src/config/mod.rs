//! Configuration management for Parlance

pub mod file;

use std::time::Duration;

use crate::gemini::{
    DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_STT_MODEL,
    DEFAULT_SYSTEM_PROMPT, DEFAULT_TTS_MODEL,
};
use crate::pipeline::DEFAULT_WORKERS;
use crate::voice::VoiceId;
use crate::{Error, Result};

use self::file::ParlanceConfigFile;

/// Environment variable holding the Gemini API key
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Default seconds of audio captured per turn
pub const DEFAULT_RECORD_SECONDS: f64 = 5.0;

/// Parlance configuration
#[derive(Clone)]
pub struct Config {
    /// Gemini API key (from `GOOGLE_API_KEY`)
    pub api_key: String,

    /// Gemini API root
    pub base_url: String,

    /// Model used for replies
    pub chat_model: String,

    /// Model used for transcription
    pub stt_model: String,

    /// Model used for speech synthesis
    pub tts_model: String,

    /// System instruction for the chat session
    pub system_prompt: String,

    /// Reply length cap in tokens
    pub max_output_tokens: u32,

    /// Audio captured per turn
    pub record_duration: Duration,

    /// Concurrent synthesis workers
    pub workers: usize,

    /// Per-sentence synthesis timeout; `None` waits indefinitely
    pub synthesis_timeout: Option<Duration>,

    /// Voice active before any emotion is detected
    pub voice: VoiceId,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("stt_model", &self.stt_model)
            .field("tts_model", &self.tts_model)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("record_duration", &self.record_duration)
            .field("workers", &self.workers)
            .field("synthesis_timeout", &self.synthesis_timeout)
            .field("voice", &self.voice)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// A `.env` file in the working directory is read first if present.
    ///
    /// # Errors
    ///
    /// Returns error if `GOOGLE_API_KEY` is not set or a value is invalid
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }

        let fc = file::load_config_file();
        Self::from_sources(|key| std::env::var(key).ok(), fc)
    }

    /// Resolve configuration from an environment lookup and a config file
    ///
    /// # Errors
    ///
    /// Returns error if no API key is available or a value is invalid
    pub fn from_sources(
        env: impl Fn(&str) -> Option<String>,
        fc: ParlanceConfigFile,
    ) -> Result<Self> {
        let api_key = env(API_KEY_ENV)
            .or(fc.gemini.api_key)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("{API_KEY_ENV} is not set")))?;

        let base_url = env("PARLANCE_BASE_URL")
            .or(fc.gemini.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let chat_model = env("PARLANCE_CHAT_MODEL")
            .or(fc.gemini.chat_model)
            .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());

        let stt_model = env("PARLANCE_STT_MODEL")
            .or(fc.gemini.stt_model)
            .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string());

        let tts_model = env("PARLANCE_TTS_MODEL")
            .or(fc.gemini.tts_model)
            .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string());

        let system_prompt = env("PARLANCE_SYSTEM_PROMPT")
            .or(fc.gemini.system_prompt)
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let max_output_tokens = parse_env(&env, "PARLANCE_MAX_OUTPUT_TOKENS")?
            .or(fc.gemini.max_output_tokens)
            .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS);

        let record_seconds = parse_env(&env, "PARLANCE_RECORD_SECONDS")?
            .or(fc.audio.record_seconds)
            .unwrap_or(DEFAULT_RECORD_SECONDS);
        let record_duration = seconds("record_seconds", record_seconds)?;

        let workers = parse_env(&env, "PARLANCE_TTS_WORKERS")?
            .or(fc.pipeline.workers)
            .unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }

        let synthesis_timeout = parse_env(&env, "PARLANCE_SYNTHESIS_TIMEOUT")?
            .or(fc.pipeline.synthesis_timeout_secs)
            .map(|secs| seconds("synthesis_timeout", secs))
            .transpose()?;

        // Unknown voice names fall back to the default rather than failing startup
        let voice = env("PARLANCE_VOICE")
            .or(fc.voice.default)
            .and_then(|name| match name.parse::<VoiceId>() {
                Ok(voice) => Some(voice),
                Err(e) => {
                    tracing::warn!(
                        voice = %name,
                        available = %VoiceId::available(),
                        error = %e,
                        "unknown voice in config, using default"
                    );
                    None
                }
            })
            .unwrap_or_default();

        Ok(Self {
            api_key,
            base_url,
            chat_model,
            stt_model,
            tts_model,
            system_prompt,
            max_output_tokens,
            record_duration,
            workers,
            synthesis_timeout,
            voice,
        })
    }
}

fn parse_env<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key} ({raw}): {e}")))
        })
        .transpose()
}

/// Validate a positive, representable number of seconds
///
/// # Errors
///
/// Returns [`Error::Config`] naming `name` if `secs` is not positive or too
/// large for a [`Duration`]
pub fn seconds(name: &str, secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(Error::Config(format!("{name} must be a positive number of seconds")));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::Config(format!("{name} of {secs} seconds is out of range: {e}")))
}

//! Error types for Parlance

use thiserror::Error;

/// Result type alias for Parlance operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Parlance
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing credential, bad config value)
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Reply generation error
    #[error("generation error: {0}")]
    Generation(String),

    /// Sentence pipeline error (out-of-order unit, closed pool)
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Base64 decoding error
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl Error {
    /// Whether this error only aborts the current conversation turn
    ///
    /// Configuration and device errors are not turn-local: retrying the
    /// next turn would fail the same way.
    #[must_use]
    pub const fn is_turn_local(&self) -> bool {
        matches!(
            self,
            Self::Stt(_)
                | Self::Tts(_)
                | Self::Generation(_)
                | Self::Http(_)
                | Self::Serialization(_)
                | Self::Base64(_)
        )
    }
}

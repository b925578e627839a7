//! External service interfaces
//!
//! The conversation loop talks to reply generation, transcription and speech
//! synthesis only through these traits. [`crate::gemini`] provides the
//! production implementations.

use async_trait::async_trait;

use crate::Result;
use crate::voice::VoiceId;

/// Produces a text reply for a user message
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send a message and return the complete reply
    ///
    /// # Errors
    ///
    /// Returns error if the service call fails
    async fn send(&self, message: &str) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Converts recorded speech into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe raw 16-bit PCM audio
    ///
    /// # Errors
    ///
    /// Returns error if the service call fails
    async fn transcribe(&self, pcm: &[u8], sample_rate: u32, channels: u16) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Converts text into encoded audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` with `voice`
    ///
    /// An empty buffer means nothing could be produced and is treated the
    /// same as an error by callers.
    ///
    /// # Errors
    ///
    /// Returns error if the service call fails
    async fn synthesize(&self, text: &str, voice: VoiceId) -> Result<Vec<u8>>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

//! Speech-to-text via multimodal prompt

use std::time::Instant;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{Content, GeminiClient, GenerateRequest, Part};
use crate::services::Transcriber;
use crate::voice::pcm16_to_wav;
use crate::{Error, Result};

/// Default transcription model
pub const DEFAULT_STT_MODEL: &str = "gemini-2.0-flash";

const TRANSCRIBE_PROMPT: &str = "Transcribe this audio";

/// Transcribes recorded speech by sending it inline as WAV
#[derive(Debug, Clone)]
pub struct GeminiTranscriber {
    client: GeminiClient,
    model: String,
}

impl GeminiTranscriber {
    #[must_use]
    pub const fn new(client: GeminiClient, model: String) -> Self {
        Self { client, model }
    }

    fn build_request(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<GenerateRequest> {
        let wav = pcm16_to_wav(pcm, sample_rate, channels)?;

        Ok(GenerateRequest {
            contents: vec![Content::user(vec![
                Part::text(TRANSCRIBE_PROMPT),
                Part::inline("audio/wav", STANDARD.encode(wav)),
            ])],
            ..Default::default()
        })
    }
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    async fn transcribe(&self, pcm: &[u8], sample_rate: u32, channels: u16) -> Result<String> {
        if pcm.is_empty() {
            return Err(Error::Stt("no audio captured".to_string()));
        }

        let started = Instant::now();
        let request = Self::build_request(pcm, sample_rate, channels)?;

        tracing::debug!(
            model = %self.model,
            audio_bytes = pcm.len(),
            sample_rate,
            "transcribing audio"
        );

        let response = self
            .client
            .generate(&self.model, &request, Error::Stt)
            .await?;

        let transcript = response.text().trim().to_string();

        tracing::info!(
            chars = transcript.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "transcription complete"
        );

        Ok(transcript)
    }

    fn name(&self) -> &'static str {
        "gemini-stt"
    }
}

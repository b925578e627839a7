//! Text-to-speech with prebuilt voices

use std::time::Instant;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{
    Content, GeminiClient, GenerateRequest, GenerationConfig, Part, PrebuiltVoiceConfig,
    SpeechConfig, VoiceConfig,
};
use crate::services::Synthesizer;
use crate::voice::VoiceId;
use crate::{Error, Result};

/// Default speech model
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Synthesizes 24kHz mono 16-bit PCM
#[derive(Debug, Clone)]
pub struct GeminiSynthesizer {
    client: GeminiClient,
    model: String,
}

impl GeminiSynthesizer {
    #[must_use]
    pub const fn new(client: GeminiClient, model: String) -> Self {
        Self { client, model }
    }

    fn build_request(text: &str, voice: VoiceId) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content::user(vec![Part::text(text)])],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.as_str().to_string(),
                        },
                    },
                }),
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl Synthesizer for GeminiSynthesizer {
    async fn synthesize(&self, text: &str, voice: VoiceId) -> Result<Vec<u8>> {
        let started = Instant::now();
        let request = Self::build_request(text, voice);

        let response = self
            .client
            .generate(&self.model, &request, Error::Tts)
            .await?;

        // A response without audio is treated as silence, not an error
        let Some(inline) = response.inline_data() else {
            tracing::warn!(voice = %voice, "no audio in TTS response");
            return Ok(Vec::new());
        };

        let audio = STANDARD.decode(&inline.data)?;

        tracing::debug!(
            voice = %voice,
            mime = %inline.mime_type,
            bytes = audio.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "speech synthesized"
        );

        Ok(audio)
    }

    fn name(&self) -> &'static str {
        "gemini-tts"
    }
}

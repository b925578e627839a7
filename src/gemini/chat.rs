//! Reply generation with in-memory chat history

use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;

use super::{Content, GeminiClient, GenerateRequest, GenerationConfig, Part};
use crate::services::TextGenerator;
use crate::{Error, Result};

/// Default chat model
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";

/// Default system instruction; short replies keep speech latency down
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Be concise and brief in your responses. Keep responses under 50 words when possible.";

/// Default cap on reply length
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 150;

/// Default number of past exchanges resent with each message
pub const DEFAULT_HISTORY_EXCHANGES: usize = 20;

/// Chat session against a Gemini model
///
/// History lives only as long as this value and keeps the most recent
/// `history_exchanges` user/model pairs; older ones are dropped.
pub struct GeminiChat {
    client: GeminiClient,
    model: String,
    system_prompt: String,
    max_output_tokens: u32,
    history_exchanges: usize,
    history: Mutex<Vec<Content>>,
}

impl GeminiChat {
    #[must_use]
    pub fn new(client: GeminiClient, model: String) -> Self {
        Self {
            client,
            model,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            history_exchanges: DEFAULT_HISTORY_EXCHANGES,
            history: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub const fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Keep at most `exchanges` past user/model pairs (0 disables history)
    #[must_use]
    pub const fn with_history_limit(mut self, exchanges: usize) -> Self {
        self.history_exchanges = exchanges;
        self
    }

    /// Number of messages (user and model) in the session
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.lock().map(|h| h.len()).unwrap_or_default()
    }

    /// Forget the conversation so far
    pub fn clear_history(&self) {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
    }

    /// Append a completed exchange, dropping the oldest beyond the limit
    fn remember(&self, message: &str, reply: &str) {
        let Ok(mut history) = self.history.lock() else {
            return;
        };
        history.push(Content::user(vec![Part::text(message)]));
        history.push(Content::model_text(reply));

        let keep = self.history_exchanges * 2;
        if history.len() > keep {
            let excess = history.len() - keep;
            history.drain(..excess);
            tracing::debug!(dropped = excess, "chat history trimmed");
        }
    }

    fn build_request(&self, message: &str) -> GenerateRequest {
        let mut contents = self
            .history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default();
        contents.push(Content::user(vec![Part::text(message)]));

        GenerateRequest {
            contents,
            system_instruction: Some(Content::instruction(&self.system_prompt)),
            generation_config: Some(GenerationConfig {
                max_output_tokens: Some(self.max_output_tokens),
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiChat {
    async fn send(&self, message: &str) -> Result<String> {
        let started = Instant::now();
        let request = self.build_request(message);

        let response = self
            .client
            .generate(&self.model, &request, Error::Generation)
            .await?;

        let reply = response.text();
        if reply.trim().is_empty() {
            return Err(Error::Generation("model returned an empty reply".to_string()));
        }

        // Only completed exchanges enter the history
        self.remember(message, &reply);

        tracing::info!(
            model = %self.model,
            reply_chars = reply.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "reply generated"
        );

        Ok(reply)
    }

    fn name(&self) -> &'static str {
        "gemini-chat"
    }
}

//! Parlance - spoken conversations with Gemini
//!
//! This library provides the pieces of a voice conversation loop:
//! - Microphone capture and speaker playback
//! - Transcription, reply generation and speech synthesis via Gemini
//! - Emotion-driven voice selection
//! - A sentence pipeline that synthesizes the next sentence while the
//!   current one plays
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 ConversationLoop                     │
//! │   capture → transcribe → detect → reply → speak     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Sentence pipeline                    │
//! │   Segmenter  │  Sequencer  │  Synthesis worker pool │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │             Gemini (generateContent)                 │
//! │   Chat  │  STT  │  TTS                              │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod gemini;
pub mod pipeline;
pub mod services;
pub mod voice;

pub use config::Config;
pub use conversation::{ConversationLoop, LoopOptions, RunSummary, TurnReport};
pub use error::{Error, Result};
pub use gemini::{GeminiChat, GeminiClient, GeminiSynthesizer, GeminiTranscriber};
pub use pipeline::{
    JobHandle, JobStatus, PlaybackSequencer, PlaybackSummary, SentenceSegmenter, SentenceUnit,
    SynthesisWorkerPool,
};
pub use services::{Synthesizer, TextGenerator, Transcriber};
pub use voice::{AudioDevice, CpalDevice, Emotion, VoiceId, VoiceSelector, VoiceState};

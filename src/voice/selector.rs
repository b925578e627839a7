//! Emotion-driven voice selection
//!
//! A transcript is scanned for emotion keywords; the first emotion in table
//! order with a matching keyword switches the active synthesis voice. The
//! active voice is read once per synthesis submission, so a job in flight
//! keeps the voice it was submitted with.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Prebuilt synthesis voice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VoiceId {
    #[default]
    Kore,
    Charon,
    Fenrir,
    Aoede,
}

impl VoiceId {
    /// Every voice the synthesis service offers
    pub const ALL: [Self; 4] = [Self::Kore, Self::Charon, Self::Fenrir, Self::Aoede];

    /// Name as understood by the synthesis service
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kore => "Kore",
            Self::Charon => "Charon",
            Self::Fenrir => "Fenrir",
            Self::Aoede => "Aoede",
        }
    }

    /// Comma-separated list of voice names, for messages
    #[must_use]
    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                Error::Config(format!(
                    "unknown voice: {name} (available: {})",
                    Self::available()
                ))
            })
    }
}

/// Emotion recognised in a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Excited,
    Angry,
    Calm,
    Happy,
    Serious,
    Energetic,
    Peaceful,
    Neutral,
}

impl Emotion {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Excited => "excited",
            Self::Angry => "angry",
            Self::Calm => "calm",
            Self::Happy => "happy",
            Self::Serious => "serious",
            Self::Energetic => "energetic",
            Self::Peaceful => "peaceful",
            Self::Neutral => "neutral",
        }
    }

    /// Voice used to speak in this emotion
    #[must_use]
    pub const fn voice(self) -> VoiceId {
        match self {
            Self::Excited | Self::Energetic => VoiceId::Fenrir,
            Self::Angry | Self::Serious => VoiceId::Charon,
            Self::Calm | Self::Peaceful => VoiceId::Aoede,
            Self::Happy | Self::Neutral => VoiceId::Kore,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword table, scanned top to bottom; first hit wins
const EMOTION_KEYWORDS: [(Emotion, &[&str]); 8] = [
    (
        Emotion::Excited,
        &["excited", "thrilled", "amazing", "fantastic", "wow"],
    ),
    (
        Emotion::Angry,
        &["angry", "mad", "furious", "annoyed", "upset"],
    ),
    (
        Emotion::Calm,
        &["calm", "peaceful", "relax", "gentle", "soothing"],
    ),
    (
        Emotion::Happy,
        &["happy", "joyful", "cheerful", "glad", "delighted"],
    ),
    (
        Emotion::Serious,
        &["serious", "important", "urgent", "critical", "formal"],
    ),
    (
        Emotion::Energetic,
        &["energetic", "dynamic", "powerful", "strong", "intense"],
    ),
    (
        Emotion::Peaceful,
        &["peaceful", "serene", "tranquil", "quiet", "meditation"],
    ),
    (Emotion::Neutral, &["normal", "regular", "standard", "default"]),
];

/// Find the first emotion in table order whose keywords occur in `text`
///
/// Matching is a case-insensitive substring test, so "mad" also matches
/// "made".
#[must_use]
pub fn match_emotion(text: &str) -> Option<Emotion> {
    let lower = text.to_lowercase();
    EMOTION_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(emotion, _)| *emotion)
}

/// The active synthesis voice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoiceState {
    current: VoiceId,
}

impl VoiceState {
    #[must_use]
    pub const fn new(current: VoiceId) -> Self {
        Self { current }
    }

    /// Snapshot of the active voice
    #[must_use]
    pub const fn current(&self) -> VoiceId {
        self.current
    }
}

/// Switches the active voice based on detected emotion or explicit request
#[derive(Debug, Clone, Default)]
pub struct VoiceSelector {
    state: VoiceState,
}

impl VoiceSelector {
    #[must_use]
    pub const fn new(initial: VoiceId) -> Self {
        Self {
            state: VoiceState::new(initial),
        }
    }

    /// Current voice state
    #[must_use]
    pub const fn state(&self) -> &VoiceState {
        &self.state
    }

    /// Snapshot of the active voice
    #[must_use]
    pub const fn current(&self) -> VoiceId {
        self.state.current
    }

    /// Detect an emotion in `text` and switch to its voice
    ///
    /// No match leaves the active voice unchanged.
    pub fn detect(&mut self, text: &str) -> Option<Emotion> {
        let emotion = match_emotion(text)?;
        let old_voice = self.state.current;
        self.state.current = emotion.voice();

        tracing::info!(
            emotion = %emotion,
            from = %old_voice,
            to = %self.state.current,
            "emotion detected, voice changed"
        );

        Some(emotion)
    }

    /// Switch to the named voice
    ///
    /// Returns `false` and keeps the current voice if the name is unknown.
    pub fn set_voice(&mut self, name: &str) -> bool {
        match name.parse::<VoiceId>() {
            Ok(voice) => {
                self.state.current = voice;
                tracing::info!(voice = %voice, "voice set");
                true
            }
            Err(_) => {
                tracing::warn!(
                    voice = name,
                    available = %VoiceId::available(),
                    "unknown voice"
                );
                false
            }
        }
    }
}

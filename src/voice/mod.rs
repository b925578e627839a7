//! Voice I/O and voice selection
//!
//! Handles audio capture, playback, and emotion-driven voice switching.
//! Audio crosses module boundaries as 16-bit little-endian mono PCM.

mod capture;
mod playback;
mod selector;

use std::time::Duration;

use async_trait::async_trait;

pub use capture::{AudioCapture, CAPTURE_CHANNELS, SAMPLE_RATE, pcm16_to_wav, samples_to_pcm16};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, pcm16_to_samples};
pub use selector::{Emotion, VoiceId, VoiceSelector, VoiceState, match_emotion};

use crate::Result;

/// Microphone and speaker, owned by the conversation's control task
///
/// Not `Send`: audio streams stay on the task that opened them.
#[async_trait(?Send)]
pub trait AudioDevice {
    /// Record `duration` of 16-bit PCM at [`AudioDevice::capture_format`]
    ///
    /// # Errors
    ///
    /// Returns error if the input device fails
    async fn capture(&mut self, duration: Duration) -> Result<Vec<u8>>;

    /// Play 16-bit PCM to completion; empty audio is a no-op
    ///
    /// # Errors
    ///
    /// Returns error if the output device fails
    async fn play(&mut self, pcm: &[u8]) -> Result<()>;

    /// Sample rate and channel count of captured audio
    fn capture_format(&self) -> (u32, u16) {
        (SAMPLE_RATE, CAPTURE_CHANNELS)
    }
}

/// Default system microphone and speaker via cpal
pub struct CpalDevice {
    capture: AudioCapture,
    playback: AudioPlayback,
}

impl CpalDevice {
    /// Open the default input and output devices
    ///
    /// # Errors
    ///
    /// Returns error if either device cannot be opened
    pub fn new() -> Result<Self> {
        Ok(Self {
            capture: AudioCapture::new()?,
            playback: AudioPlayback::new()?,
        })
    }
}

#[async_trait(?Send)]
impl AudioDevice for CpalDevice {
    async fn capture(&mut self, duration: Duration) -> Result<Vec<u8>> {
        let samples = self.capture.record(duration).await?;
        Ok(samples_to_pcm16(&samples))
    }

    async fn play(&mut self, pcm: &[u8]) -> Result<()> {
        self.playback.play_pcm16(pcm)
    }
}

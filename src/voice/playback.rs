//! Speaker playback

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches Gemini TTS output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Speaker output at [`PLAYBACK_SAMPLE_RATE`]
///
/// Mono is preferred; a stereo-only device gets the same sample on both
/// channels.
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if there is no output device or it cannot play 24kHz audio
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let config = [1, 2]
            .into_iter()
            .find_map(|channels| output_config(&device, channels))
            .ok_or_else(|| Error::Audio("speaker cannot play 24kHz audio".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "speaker opened"
        );

        Ok(Self { device, config })
    }

    /// Play 16-bit little-endian mono PCM at [`PLAYBACK_SAMPLE_RATE`]
    ///
    /// Opens the output stream, blocks until the audio has played, then
    /// closes it. Empty input returns immediately without touching the
    /// device.
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    pub fn play_pcm16(&mut self, pcm: &[u8]) -> Result<()> {
        self.play_samples(pcm16_to_samples(pcm))
    }

    /// Play f32 mono samples, returning once they have drained
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be opened
    pub fn play_samples(&mut self, samples: Vec<f32>) -> Result<()> {
        let total = samples.len();
        if total == 0 {
            return Ok(());
        }

        let width = usize::from(self.config.channels);
        let drained = Arc::new(AtomicBool::new(false));

        let stream = {
            let drained = Arc::clone(&drained);
            let mut source = samples.into_iter();

            self.device
                .build_output_stream(
                    &self.config,
                    move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in out.chunks_mut(width) {
                            let value = source.next().unwrap_or_else(|| {
                                drained.store(true, Ordering::Release);
                                0.0
                            });
                            frame.fill(value);
                        }
                    },
                    |err| tracing::error!(error = %err, "speaker stream error"),
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        // Clip length plus slack
        let clip_ms = (total as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let deadline = Instant::now() + Duration::from_millis(clip_ms + 500);

        while !drained.load(Ordering::Acquire) {
            if Instant::now() >= deadline {
                tracing::warn!(samples = total, "playback did not drain in time");
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        // Device still holds its last buffer
        std::thread::sleep(Duration::from_millis(100));
        drop(stream);

        tracing::debug!(samples = total, "clip played");
        Ok(())
    }
}

/// Output config with `channels` at [`PLAYBACK_SAMPLE_RATE`], if supported
fn output_config(device: &Device, channels: u16) -> Option<StreamConfig> {
    let wanted = SampleRate(PLAYBACK_SAMPLE_RATE);
    device
        .supported_output_configs()
        .ok()?
        .find(|c| {
            c.channels() == channels
                && (c.min_sample_rate()..=c.max_sample_rate()).contains(&wanted)
        })
        .map(|c| c.with_sample_rate(wanted).config())
}

/// Decode 16-bit little-endian PCM to f32 samples
///
/// A trailing odd byte is ignored.
#[must_use]
pub fn pcm16_to_samples(pcm: &[u8]) -> Vec<f32> {
    pcm.chunks_exact(2)
        .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0)
        .collect()
}

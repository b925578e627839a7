//! Microphone capture

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Capture sample rate (16kHz speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Captured audio is mono
pub const CAPTURE_CHANNELS: u16 = 1;

/// Records f32 samples from the default input device
///
/// Samples accumulate in a shared buffer while the stream is open.
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    samples: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device at 16kHz mono
    ///
    /// # Errors
    ///
    /// Returns error if there is no input device or it cannot record 16kHz mono
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let range = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == CAPTURE_CHANNELS
                    && (c.min_sample_rate()..=c.max_sample_rate())
                        .contains(&SampleRate(SAMPLE_RATE))
            })
            .ok_or_else(|| Error::Audio("input device cannot record 16kHz mono".to_string()))?;
        let config = range.with_sample_rate(SampleRate(SAMPLE_RATE)).config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "microphone opened"
        );

        Ok(Self {
            device,
            config,
            samples: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Open the input stream; samples start accumulating
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be built or started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let samples = Arc::clone(&self.samples);
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = samples.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| tracing::error!(error = %err, "microphone stream error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Close the input stream, keeping what was captured
    pub fn stop(&mut self) {
        self.stream = None;
    }

    /// Record for `duration` and return the captured samples
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be started
    pub async fn record(&mut self, duration: Duration) -> Result<Vec<f32>> {
        self.clear();
        self.start()?;
        tokio::time::sleep(duration).await;
        self.stop();

        let samples = self.take_samples();
        tracing::debug!(
            samples = samples.len(),
            duration_ms = duration.as_millis(),
            "recording captured"
        );
        Ok(samples)
    }

    /// Remove and return everything captured so far
    #[must_use]
    pub fn take_samples(&self) -> Vec<f32> {
        self.samples
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Copy of everything captured so far
    #[must_use]
    pub fn samples(&self) -> Vec<f32> {
        self.samples
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Discard captured samples
    pub fn clear(&self) {
        if let Ok(mut buf) = self.samples.lock() {
            buf.clear();
        }
    }

    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}

/// Convert f32 samples in [-1.0, 1.0] to 16-bit little-endian PCM
#[must_use]
pub fn samples_to_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| {
            #[allow(clippy::cast_possible_truncation)]
            let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            value.to_le_bytes()
        })
        .collect()
}

/// Wrap 16-bit little-endian PCM in a WAV container
///
/// A trailing odd byte is dropped.
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn pcm16_to_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| Error::Audio(format!("wav encoding failed: {e}"));

    let mut out = std::io::Cursor::new(Vec::with_capacity(44 + pcm.len()));
    let mut writer = hound::WavWriter::new(&mut out, spec).map_err(wav_err)?;
    for frame in pcm.chunks_exact(2) {
        writer
            .write_sample(i16::from_le_bytes([frame[0], frame[1]]))
            .map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;

    Ok(out.into_inner())
}

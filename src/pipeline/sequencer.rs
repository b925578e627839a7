//! In-order playback of a reply, one sentence ahead
//!
//! The sequencer keeps at most one synthesis job outstanding. When sentence
//! `N` arrives it collects and plays the audio of sentence `N-1`, then
//! submits `N`. The job for `N` runs while the caller produces sentence
//! `N+1`, and a submitted sentence is always played before the next one is
//! submitted. Playback order is the submission order by construction;
//! nothing is ever sorted or reordered.
//!
//! ```text
//!   push(0): submit 0
//!   push(1): resolve 0 ─ play 0 ─ submit 1
//!   push(2):                      resolve 1 ─ play 1 ─ submit 2
//!   finish():                                          resolve 2 ─ play 2
//! ```

use std::time::Instant;

use super::{JobHandle, SentenceUnit, SynthesisWorkerPool};
use crate::voice::{AudioDevice, VoiceId, VoiceState};
use crate::{Error, Result};

/// Where the sequencer is in the current reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// No outstanding job
    Idle,
    /// One submitted sentence awaits playback
    Pipelined,
}

/// Outcome of one reply's playback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    /// Sentences played, including silent ones
    pub played: u64,

    /// Sentences whose synthesis produced no audio
    pub silent: u64,

    /// Voices used, in playback order
    pub voices: Vec<VoiceId>,
}

/// Plays a reply's sentences in order while synthesizing one ahead
pub struct PlaybackSequencer<'a> {
    pool: &'a mut SynthesisWorkerPool,
    outstanding: Option<JobHandle>,
    next_submit: u64,
    cursor: u64,
    summary: PlaybackSummary,
    started: Instant,
}

impl<'a> PlaybackSequencer<'a> {
    /// Start a reply on `pool`
    pub fn new(pool: &'a mut SynthesisWorkerPool) -> Self {
        Self {
            pool,
            outstanding: None,
            next_submit: 0,
            cursor: 0,
            summary: PlaybackSummary::default(),
            started: Instant::now(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> SequencerState {
        if self.outstanding.is_some() {
            SequencerState::Pipelined
        } else {
            SequencerState::Idle
        }
    }

    /// Index of the next sentence allowed to play
    #[must_use]
    pub const fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Submitted sentences not yet played (0 or 1)
    #[must_use]
    pub const fn outstanding(&self) -> usize {
        if self.outstanding.is_some() { 1 } else { 0 }
    }

    /// Accept the next sentence of the reply
    ///
    /// Waits for the previous sentence's audio and plays it, then hands this
    /// one to the pool with the voice active right now.
    ///
    /// # Errors
    ///
    /// Returns error if `unit` is out of sequence or the device fails
    pub async fn push(
        &mut self,
        unit: &SentenceUnit,
        voice: &VoiceState,
        device: &mut dyn AudioDevice,
    ) -> Result<()> {
        if unit.index != self.next_submit {
            return Err(Error::Pipeline(format!(
                "sentence {} arrived, expected {}",
                unit.index, self.next_submit
            )));
        }

        if let Some(job) = self.outstanding.take() {
            self.drain(job, device).await?;
        }

        tracing::debug!(
            index = unit.index,
            text = %unit.text,
            terminal = unit.terminal,
            "processing sentence"
        );
        self.outstanding = Some(self.pool.submit(unit, voice.current()));
        self.next_submit += 1;

        Ok(())
    }

    /// Play whatever is still outstanding and close the reply
    ///
    /// # Errors
    ///
    /// Returns error if the device fails
    pub async fn finish(mut self, device: &mut dyn AudioDevice) -> Result<PlaybackSummary> {
        if let Some(job) = self.outstanding.take() {
            self.drain(job, device).await?;
        }

        tracing::info!(
            sentences = self.summary.played,
            silent = self.summary.silent,
            elapsed_ms = self.started.elapsed().as_millis(),
            "reply playback complete"
        );

        Ok(std::mem::take(&mut self.summary))
    }

    /// Drop the reply without playing the outstanding sentence
    ///
    /// A job still waiting for a worker is cancelled; a running one finishes
    /// in the background and its audio is discarded.
    pub fn abandon(&mut self) {
        if let Some(mut job) = self.outstanding.take() {
            let cancelled = job.cancel();
            tracing::info!(index = job.index(), cancelled, "reply abandoned");
        }
    }

    /// Resolve `job` and play its audio
    async fn drain(&mut self, job: JobHandle, device: &mut dyn AudioDevice) -> Result<()> {
        let index = job.index();
        let voice = job.voice();
        let audio = self.pool.resolve(job).await;
        self.play(index, voice, &audio, device).await
    }

    async fn play(
        &mut self,
        index: u64,
        voice: VoiceId,
        audio: &[u8],
        device: &mut dyn AudioDevice,
    ) -> Result<()> {
        debug_assert_eq!(index, self.cursor, "playback out of order");

        if audio.is_empty() {
            self.summary.silent += 1;
            tracing::warn!(index, "no audio for sentence, skipping");
        }

        device.play(audio).await?;

        self.cursor += 1;
        self.summary.played += 1;
        self.summary.voices.push(voice);
        Ok(())
    }
}

impl Drop for PlaybackSequencer<'_> {
    fn drop(&mut self) {
        self.abandon();
    }
}

impl std::fmt::Debug for PlaybackSequencer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSequencer")
            .field("state", &self.state())
            .field("cursor", &self.cursor)
            .field("next_submit", &self.next_submit)
            .finish_non_exhaustive()
    }
}

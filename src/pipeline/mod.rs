//! Streaming sentence pipeline
//!
//! A reply flows through three stages:
//!
//! ```text
//! reply text ──► SentenceSegmenter ──► PlaybackSequencer ──► AudioDevice
//!                                         │      ▲
//!                                  submit │      │ resolve
//!                                         ▼      │
//!                                  SynthesisWorkerPool ──► Synthesizer
//! ```
//!
//! The segmenter and sequencer run on the conversation's control task; only
//! synthesis runs on pool workers.

mod pool;
mod segmenter;
mod sequencer;

pub use pool::{DEFAULT_WORKERS, JobHandle, JobStatus, SynthesisWorkerPool};
pub use segmenter::{SentenceSegmenter, SentenceUnit, segment};
pub use sequencer::{PlaybackSequencer, PlaybackSummary, SequencerState};

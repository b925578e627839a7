//! Bounded-concurrency speech synthesis
//!
//! Each submitted sentence becomes a tokio task that waits for one of a fixed
//! number of worker permits, calls the [`Synthesizer`], and hands the audio
//! back through a oneshot channel. Permits are granted in FIFO order, so
//! queued sentences start in the order they were submitted.
//!
//! A failed synthesis never surfaces as an error to the caller: the job
//! resolves to empty audio and the failure is logged and counted.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinSet;

use super::SentenceUnit;
use crate::services::Synthesizer;
use crate::voice::VoiceId;
use crate::Error;

/// Default number of concurrent synthesis workers
pub const DEFAULT_WORKERS: usize = 2;

/// Lifecycle of a synthesis job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Waiting for a worker
    Pending,
    /// Synthesis call in progress
    Running,
    /// Audio produced
    Done,
    /// Synthesis failed, resolves to empty audio
    Failed,
    /// Dropped before a worker picked it up
    Cancelled,
}

impl JobStatus {
    /// Whether the job can no longer change state
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// State shared between a [`JobHandle`] and its worker task
#[derive(Debug)]
struct JobState {
    status: Mutex<JobStatus>,
}

impl JobState {
    fn new() -> Self {
        Self {
            status: Mutex::new(JobStatus::Pending),
        }
    }

    fn get(&self) -> JobStatus {
        self.status
            .lock()
            .map_or(JobStatus::Failed, |status| *status)
    }

    fn set(&self, next: JobStatus) {
        if let Ok(mut status) = self.status.lock() {
            *status = next;
        }
    }

    /// Move Pending to Running; false if the job was cancelled first
    fn start(&self) -> bool {
        self.status.lock().is_ok_and(|mut status| {
            if *status == JobStatus::Pending {
                *status = JobStatus::Running;
                true
            } else {
                false
            }
        })
    }

    /// Move Pending to Cancelled; false if a worker already started it
    fn cancel(&self) -> bool {
        self.status.lock().is_ok_and(|mut status| {
            if *status == JobStatus::Pending {
                *status = JobStatus::Cancelled;
                true
            } else {
                false
            }
        })
    }
}

/// Handle to a submitted synthesis job
///
/// Dropping an unresolved handle cancels the job if no worker has started
/// it; a running job finishes and its audio is discarded.
#[derive(Debug)]
pub struct JobHandle {
    id: u64,
    index: u64,
    voice: VoiceId,
    state: Arc<JobState>,
    audio: Option<oneshot::Receiver<Vec<u8>>>,
}

impl JobHandle {
    /// Pool-wide job number
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Index of the sentence being synthesized
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Voice fixed at submission
    #[must_use]
    pub const fn voice(&self) -> VoiceId {
        self.voice
    }

    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.state.get()
    }

    /// Cancel the job if it has not started
    ///
    /// Returns true if the job will never run.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.state.cancel();
        if cancelled {
            tracing::debug!(job = self.id, index = self.index, "synthesis job cancelled");
        }
        self.audio = None;
        cancelled
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        if self.audio.is_some() {
            self.cancel();
        }
    }
}

/// Fixed-size pool of synthesis workers
pub struct SynthesisWorkerPool {
    synthesizer: Arc<dyn Synthesizer>,
    permits: Arc<Semaphore>,
    workers: usize,
    timeout: Option<Duration>,
    tasks: JoinSet<()>,
    next_id: u64,
    failures: Arc<AtomicU64>,
    running: Arc<AtomicUsize>,
}

impl SynthesisWorkerPool {
    /// Create a pool running at most `workers` syntheses at once
    #[must_use]
    pub fn new(synthesizer: Arc<dyn Synthesizer>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            synthesizer,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            timeout: None,
            tasks: JoinSet::new(),
            next_id: 0,
            failures: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Give up on a synthesis call after `timeout`, degrading to silence
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Queue `unit` for synthesis with `voice`
    ///
    /// Never waits: the job starts as soon as a worker is free.
    pub fn submit(&mut self, unit: &SentenceUnit, voice: VoiceId) -> JobHandle {
        // Reap finished tasks so the set only tracks live jobs
        while self.tasks.try_join_next().is_some() {}

        let id = self.next_id;
        self.next_id += 1;

        let state = Arc::new(JobState::new());
        let (tx, rx) = oneshot::channel();

        if self.permits.is_closed() {
            tracing::warn!(job = id, index = unit.index, "pool shut down, job dropped");
            state.set(JobStatus::Cancelled);
        } else {
            tracing::debug!(job = id, index = unit.index, voice = %voice, "synthesis job queued");
            self.tasks.spawn(run_job(
                Arc::clone(&self.synthesizer),
                Arc::clone(&self.permits),
                Arc::clone(&state),
                Arc::clone(&self.failures),
                Arc::clone(&self.running),
                self.timeout,
                JobSpec {
                    id,
                    index: unit.index,
                    text: unit.text.clone(),
                    voice,
                },
                tx,
            ));
        }

        JobHandle {
            id,
            index: unit.index,
            voice,
            state,
            audio: Some(rx),
        }
    }

    /// Wait for a job's audio
    ///
    /// Failed or cancelled jobs resolve to an empty buffer.
    pub async fn resolve(&self, mut handle: JobHandle) -> Vec<u8> {
        let Some(rx) = handle.audio.take() else {
            return Vec::new();
        };
        rx.await.unwrap_or_default()
    }

    /// Configured worker count
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Number of jobs whose synthesis call is in progress
    ///
    /// Queued, cancelled and finished jobs are not counted, before or after
    /// shutdown.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Number of jobs that resolved to silence because synthesis failed
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Whether the pool still accepts work
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.permits.is_closed()
    }

    /// Stop accepting work and wait for running jobs
    ///
    /// Queued jobs are cancelled without starting; the wait is bounded by
    /// the jobs already holding a worker.
    pub async fn shutdown(&mut self) {
        if self.permits.is_closed() && self.tasks.is_empty() {
            return;
        }

        self.permits.close();
        let running = self.in_flight();
        tracing::debug!(running, "shutting down synthesis pool");

        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "synthesis task ended abnormally");
            }
        }

        tracing::debug!("synthesis pool stopped");
    }
}

impl std::fmt::Debug for SynthesisWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisWorkerPool")
            .field("synthesizer", &self.synthesizer.name())
            .field("workers", &self.workers)
            .field("timeout", &self.timeout)
            .field("live_tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

/// Counts a job as running for as long as it is held
struct RunningGuard(Arc<AtomicUsize>);

impl RunningGuard {
    fn enter(running: Arc<AtomicUsize>) -> Self {
        running.fetch_add(1, Ordering::AcqRel);
        Self(running)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// What a worker needs to synthesize one sentence
struct JobSpec {
    id: u64,
    index: u64,
    text: String,
    voice: VoiceId,
}

async fn run_job(
    synthesizer: Arc<dyn Synthesizer>,
    permits: Arc<Semaphore>,
    state: Arc<JobState>,
    failures: Arc<AtomicU64>,
    running: Arc<AtomicUsize>,
    timeout: Option<Duration>,
    job: JobSpec,
    tx: oneshot::Sender<Vec<u8>>,
) {
    let Ok(_permit) = permits.acquire_owned().await else {
        state.set(JobStatus::Cancelled);
        tracing::debug!(job = job.id, index = job.index, "pool closed before job started");
        return;
    };

    if !state.start() {
        return;
    }
    let guard = RunningGuard::enter(running);

    let preview: String = job.text.chars().take(20).collect();
    let started = Instant::now();

    let call = synthesizer.synthesize(&job.text, job.voice);
    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
            Err(Error::Tts(format!("timed out after {}ms", limit.as_millis())))
        }),
        None => call.await,
    };

    let elapsed_ms = started.elapsed().as_millis();
    let audio = match outcome {
        Ok(audio) if !audio.is_empty() => {
            state.set(JobStatus::Done);
            tracing::info!(
                job = job.id,
                index = job.index,
                voice = %job.voice,
                text = %preview,
                bytes = audio.len(),
                elapsed_ms,
                "synthesis complete"
            );
            audio
        }
        Ok(_) => {
            state.set(JobStatus::Failed);
            failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                job = job.id,
                index = job.index,
                text = %preview,
                elapsed_ms,
                "synthesis returned no audio"
            );
            Vec::new()
        }
        Err(e) => {
            state.set(JobStatus::Failed);
            failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                job = job.id,
                index = job.index,
                text = %preview,
                elapsed_ms,
                error = %e,
                "synthesis failed"
            );
            Vec::new()
        }
    };
    drop(guard);

    // The handle may have been dropped; the audio is then discarded
    let _ = tx.send(audio);
}

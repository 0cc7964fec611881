//! Cancellable background extraction.
//!
//! [`ExtractionTask`] owns one [`ExtractionEngine`] run on a dedicated
//! worker thread, relaying progress to the caller either through a supplied
//! callback (invoked on the worker) or through a crossbeam channel whose
//! receiver the caller drains from its own thread. The cooperative stop flag
//! is the only state shared between the caller and the worker.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver};
use tracing::info;

use crate::error::{ArchiveError, Result};
use crate::extract::ExtractionEngine;

/// One progress update, as delivered over the channel variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub percent: u8,
    pub message: String,
}

type SharedProgress = Arc<dyn Fn(u8, &str) + Send + Sync>;

/// A cancellable background unit of work owning one extraction run.
///
/// Two tasks on different image/destination pairs are fully independent.
/// Running two tasks against the same destination concurrently is
/// unsupported.
pub struct ExtractionTask {
    image: PathBuf,
    dest: PathBuf,
    progress: Option<SharedProgress>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<Result<()>>>,
}

impl ExtractionTask {
    /// Build a task that reports through `progress`, invoked synchronously
    /// on the worker thread. Callbacks that touch caller state must marshal
    /// to the caller's context themselves; [`ExtractionTask::with_channel`]
    /// does that for free.
    pub fn new(
        image: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
        progress: impl Fn(u8, &str) + Send + Sync + 'static,
    ) -> Self {
        Self {
            image: image.into(),
            dest: dest.into(),
            progress: Some(Arc::new(progress)),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Build a task whose progress is delivered as [`ProgressEvent`]s over a
    /// channel. The channel disconnects once the run finishes and the task's
    /// callback is dropped, so draining the receiver to disconnection is a
    /// reliable completion signal.
    pub fn with_channel(
        image: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
    ) -> (Self, Receiver<ProgressEvent>) {
        let (sender, receiver) = unbounded();
        let task = Self::new(image, dest, move |percent, message: &str| {
            let _ = sender.send(ProgressEvent {
                percent,
                message: message.to_string(),
            });
        });
        (task, receiver)
    }

    /// Start background execution; returns immediately.
    ///
    /// Fails with [`ArchiveError::StartFailed`] if the worker thread cannot
    /// be spawned or the task was already started — in either case no
    /// extraction attempt has begun.
    pub fn run(&mut self) -> Result<()> {
        let Some(progress) = self.progress.take() else {
            return Err(ArchiveError::StartFailed(io::Error::new(
                io::ErrorKind::Other,
                "task already started",
            )));
        };

        let engine = ExtractionEngine::new(self.image.clone(), self.dest.clone());
        let stop = Arc::clone(&self.stop);
        let image = self.image.clone();

        let worker = thread::Builder::new()
            .name("isoscope-extract".into())
            .spawn(move || {
                let last_percent = Arc::new(AtomicU8::new(0));
                let tracking = {
                    let last_percent = Arc::clone(&last_percent);
                    let progress = Arc::clone(&progress);
                    move |percent: u8, message: &str| {
                        last_percent.store(percent, Ordering::Relaxed);
                        progress(percent, message);
                    }
                };

                let result = engine.run(&tracking, &stop);

                // Terminal callback on any failure, so the caller can detect
                // "done" without polling. Success already carried the 100%.
                if let Err(err) = &result {
                    let percent = last_percent.load(Ordering::Relaxed);
                    let message = match err {
                        ArchiveError::Cancelled => "Extraction stopped".to_string(),
                        other => other.to_string(),
                    };
                    progress(percent, &message);
                }
                info!(image = %image.display(), ok = result.is_ok(), "extraction worker finished");
                result
            })
            .map_err(ArchiveError::StartFailed)?;

        self.worker = Some(worker);
        Ok(())
    }

    /// Request cooperative cancellation. The flag is observed at entry
    /// boundaries, so latency is bounded by the current entry, not
    /// instantaneous.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Whether the worker has finished (or was never started).
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the worker and surface the engine result: `Ok` on success,
    /// [`ArchiveError::Cancelled`] after a stop, the first fatal error
    /// otherwise.
    pub fn join(mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| {
                ArchiveError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "extraction worker panicked",
                ))
            })?,
            None => Ok(()),
        }
    }
}

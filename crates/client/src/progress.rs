//! Upload progress tracking and reporting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// Observer of upload progress events.
pub trait ProgressListener: Send + Sync {
    /// Called once before transfer starts, with the session's total part
    /// count and how many were already completed by earlier attempts.
    fn on_start(&self, total_parts: usize, completed_parts: usize);

    /// Called after each part completion is verified and recorded.
    fn on_part_completed(&self, part_number: u32);

    /// Called once after the upload has been finalized.
    fn on_finish(&self);
}

/// Shared completion counter for one upload attempt.
///
/// Transports report through this from however many tasks they fan out to;
/// the listener sees a consistent monotonically increasing count.
pub struct Progress {
    total_parts: usize,
    completed: AtomicUsize,
    listener: Arc<dyn ProgressListener>,
}

impl Progress {
    pub fn new(
        total_parts: usize,
        already_completed: usize,
        listener: Arc<dyn ProgressListener>,
    ) -> Self {
        listener.on_start(total_parts, already_completed);
        Self {
            total_parts,
            completed: AtomicUsize::new(already_completed),
            listener,
        }
    }

    pub fn part_completed(&self, part_number: u32) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.listener.on_part_completed(part_number);
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn total_parts(&self) -> usize {
        self.total_parts
    }

    pub fn finish(&self) {
        self.listener.on_finish();
    }
}

/// Default listener reporting through `tracing`.
#[derive(Clone, Debug, Default)]
pub struct LogProgressListener {
    quiet: bool,
}

impl LogProgressListener {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl ProgressListener for LogProgressListener {
    fn on_start(&self, total_parts: usize, completed_parts: usize) {
        if !self.quiet {
            info!(total_parts, completed_parts, "upload transfer starting");
        }
    }

    fn on_part_completed(&self, part_number: u32) {
        if !self.quiet {
            info!(part_number, "part completed");
        }
    }

    fn on_finish(&self) {
        if !self.quiet {
            info!("upload finalized");
        }
    }
}

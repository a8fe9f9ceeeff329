// Cancellation and progress reporting for detection runs
//
// A run is cancelled cooperatively: the caller keeps a clone of the token and
// flips it; analyzers poll it between analysis windows, sampled frames and
// chunks. Progress is pushed on an optional broadcast channel so any number of
// observers (CLI spinner, UI bridge, tests) can subscribe without the engine
// knowing about them.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::MediaError;

/// Shared flag polled by every stage of a detection run
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(MediaError::Cancelled)` once cancellation was requested
    pub fn check(&self) -> Result<(), MediaError> {
        if self.is_cancelled() {
            Err(MediaError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Pipeline stage reported with each progress update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStage {
    Planning,
    Analyzing,
    Merging,
    Fusing,
    Scoring,
    Completed,
    Cancelled,
}

/// Snapshot pushed to progress subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionProgress {
    pub stage: DetectionStage,
    pub completed_chunks: usize,
    pub total_chunks: usize,
}

impl DetectionProgress {
    pub fn new(stage: DetectionStage, completed_chunks: usize, total_chunks: usize) -> Self {
        Self {
            stage,
            completed_chunks,
            total_chunks,
        }
    }

    /// Overall completion in [0, 1]
    pub fn fraction(&self) -> f64 {
        match self.stage {
            DetectionStage::Completed => 1.0,
            DetectionStage::Planning => 0.0,
            _ if self.total_chunks == 0 => 0.0,
            // Analysis dominates the run; later stages share the last 10%.
            DetectionStage::Analyzing | DetectionStage::Cancelled => {
                0.9 * self.completed_chunks as f64 / self.total_chunks as f64
            }
            DetectionStage::Merging => 0.9,
            DetectionStage::Fusing => 0.94,
            DetectionStage::Scoring => 0.97,
        }
    }
}

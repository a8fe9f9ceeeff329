//! Time intervals shared by analyzers, the engine and the evaluator.

use serde::{Deserialize, Serialize};

/// Half-open interval `[start, end)` in seconds from the start of the video
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Length in seconds (never negative)
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Intersection, or `None` when the ranges are disjoint
    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (end > start).then(|| TimeRange::new(start, end))
    }

    /// Smallest range covering both
    pub fn union(&self, other: &TimeRange) -> TimeRange {
        TimeRange::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Gap between two ranges; negative when they overlap
    pub fn gap_to(&self, later: &TimeRange) -> f64 {
        later.start - self.end
    }
}

/// Anything that occupies a time interval
pub trait TimeSpan {
    fn span(&self) -> TimeRange;

    fn start_time(&self) -> f64 {
        self.span().start
    }

    fn end_time(&self) -> f64 {
        self.span().end
    }
}

impl TimeSpan for TimeRange {
    fn span(&self) -> TimeRange {
        *self
    }
}

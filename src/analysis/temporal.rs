// TemporalAnalyzer - rally segmentation state machine
//
// Per sampled frame the movement intensity and the (sync-corrected) hit
// sounds are folded into one `ActivitySignal`. Segmentation is a pure
// transition function over those signals:
//
//   Idle --active--> RallyStarting --N consecutive active--> InRally
//   RallyStarting --inactive--> Idle
//   InRally --inactive--> RallyEnding
//   RallyEnding --active, pause < maxPauseDuration--> InRally
//   RallyEnding --inactive, pause >= minPauseDurationToEnd--> Idle (emit)
//
// Emitted intervals are padded: start = onset - rallyStartPadding,
// end = last activity + rallyEndPadding. Duration filtering happens after
// chunk merging, so a rally cut by a chunk boundary is judged whole.

use serde::Serialize;
use std::sync::Arc;

use crate::analysis::audio::AudioAnalysis;
use crate::analysis::movement::MovementAnalysis;
use crate::config::ThresholdConfig;
use crate::time_range::{TimeRange, TimeSpan};

/// Activity observed at one sampled instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySignal {
    pub timestamp: f64,
    pub movement_intensity: f64,
    /// Hit sounds aligned to this frame
    pub hit_count: usize,
    pub active: bool,
}

/// Segmentation state, carrying the timestamps each phase needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RallyState {
    Idle,
    RallyStarting { onset: f64, active_count: u32 },
    InRally { onset: f64, last_active: f64 },
    RallyEnding { onset: f64, last_active: f64 },
}

/// Name-only view of [`RallyState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RallyPhase {
    Idle,
    RallyStarting,
    InRally,
    RallyEnding,
}

impl RallyState {
    pub fn phase(&self) -> RallyPhase {
        match self {
            RallyState::Idle => RallyPhase::Idle,
            RallyState::RallyStarting { .. } => RallyPhase::RallyStarting,
            RallyState::InRally { .. } => RallyPhase::InRally,
            RallyState::RallyEnding { .. } => RallyPhase::RallyEnding,
        }
    }
}

/// Raw rally interval produced by segmentation, not yet fusion-confirmed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateInterval {
    /// Padded interval
    pub range: TimeRange,
    /// First active instant
    pub onset: f64,
    /// Last active instant
    pub last_active: f64,
}

impl CandidateInterval {
    pub fn duration(&self) -> f64 {
        self.range.duration()
    }

    /// Unpadded span of observed activity, `interval` wide past the last active frame
    pub fn core(&self, interval: f64) -> TimeRange {
        TimeRange::new(self.onset, self.last_active + interval)
    }

    /// Combine two candidates into one covering both
    pub fn merge(&self, other: &CandidateInterval) -> CandidateInterval {
        CandidateInterval {
            range: self.range.union(&other.range),
            onset: self.onset.min(other.onset),
            last_active: self.last_active.max(other.last_active),
        }
    }
}

impl TimeSpan for CandidateInterval {
    fn span(&self) -> TimeRange {
        self.range
    }
}

/// Why a candidate was dropped by the duration filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationRejection {
    TooShort,
    TooLong,
}

/// Segments activity signals into candidate rally intervals
pub struct TemporalAnalyzer {
    config: Arc<ThresholdConfig>,
}

impl TemporalAnalyzer {
    pub fn new(config: Arc<ThresholdConfig>) -> Self {
        Self { config }
    }

    /// Fold movement frames and aligned hit sounds into activity signals
    ///
    /// A hit counts toward the frame whose half-interval window contains it.
    pub fn build_signals(
        &self,
        movement: &MovementAnalysis,
        audio: Option<&AudioAnalysis>,
    ) -> Vec<ActivitySignal> {
        let half = self.config.frame_interval() / 2.0;
        let hits = audio
            .map(|analysis| analysis.hit_sounds(movement.range.union(&analysis.range)))
            .unwrap_or_default();

        movement
            .frames
            .iter()
            .map(|frame| {
                let window = TimeRange::new(frame.timestamp - half, frame.timestamp + half);
                let hit_count = hits
                    .iter()
                    .filter(|peak| window.contains(peak.timestamp))
                    .count();
                ActivitySignal {
                    timestamp: frame.timestamp,
                    movement_intensity: frame.movement_intensity,
                    hit_count,
                    active: frame.movement_intensity >= self.config.movement_intensity_threshold
                        || hit_count > 0,
                }
            })
            .collect()
    }

    /// Pure transition: `(state, signal) -> (next state, completed interval)`
    pub fn transition(
        &self,
        state: RallyState,
        signal: &ActivitySignal,
    ) -> (RallyState, Option<CandidateInterval>) {
        let t = signal.timestamp;
        let required = self.config.rally_start_frame_count.max(1);

        match (state, signal.active) {
            (RallyState::Idle, false) => (RallyState::Idle, None),
            (RallyState::Idle, true) => (self.starting(t, 1, required), None),

            (RallyState::RallyStarting { onset, active_count }, true) => {
                (self.starting(onset, active_count + 1, required), None)
            }
            (RallyState::RallyStarting { .. }, false) => (RallyState::Idle, None),

            (RallyState::InRally { onset, .. }, true) => (
                RallyState::InRally {
                    onset,
                    last_active: t,
                },
                None,
            ),
            (RallyState::InRally { onset, last_active }, false) => {
                (RallyState::RallyEnding { onset, last_active }, None)
            }

            (RallyState::RallyEnding { onset, last_active }, true) => {
                if t - last_active < self.config.max_pause_duration {
                    (
                        RallyState::InRally {
                            onset,
                            last_active: t,
                        },
                        None,
                    )
                } else {
                    // Gap in the signal stream longer than any tolerated pause.
                    (
                        self.starting(t, 1, required),
                        Some(self.candidate(onset, last_active, f64::INFINITY)),
                    )
                }
            }
            (RallyState::RallyEnding { onset, last_active }, false) => {
                if t - last_active >= self.config.min_pause_duration_to_end {
                    (
                        RallyState::Idle,
                        Some(self.candidate(onset, last_active, f64::INFINITY)),
                    )
                } else {
                    (RallyState::RallyEnding { onset, last_active }, None)
                }
            }
        }
    }

    /// Close an open rally at the end of the signal stream
    pub fn finish(&self, state: RallyState, stream_end: f64) -> Option<CandidateInterval> {
        match state {
            RallyState::InRally { onset, last_active }
            | RallyState::RallyEnding { onset, last_active } => {
                Some(self.candidate(onset, last_active, stream_end))
            }
            RallyState::Idle | RallyState::RallyStarting { .. } => None,
        }
    }

    /// Run the state machine over `signals`, closing any open rally at `range.end`
    pub fn segment(&self, signals: &[ActivitySignal], range: TimeRange) -> Vec<CandidateInterval> {
        let mut state = RallyState::Idle;
        let mut candidates = Vec::new();
        for signal in signals {
            let (next, completed) = self.transition(state, signal);
            if next.phase() != state.phase() {
                tracing::trace!(
                    "[TemporalAnalyzer] {:.2}s: {:?} -> {:?}",
                    signal.timestamp,
                    state.phase(),
                    next.phase()
                );
            }
            candidates.extend(completed);
            state = next;
        }
        candidates.extend(self.finish(state, range.end));
        candidates
    }

    /// Split candidates by `minRallyDuration` / `maxRallyDuration`
    pub fn filter_by_duration(
        &self,
        candidates: Vec<CandidateInterval>,
    ) -> (
        Vec<CandidateInterval>,
        Vec<(CandidateInterval, DurationRejection)>,
    ) {
        let mut kept = Vec::new();
        let mut rejected = Vec::new();
        for candidate in candidates {
            let duration = candidate.duration();
            if duration < self.config.min_rally_duration {
                rejected.push((candidate, DurationRejection::TooShort));
            } else if duration > self.config.max_rally_duration {
                rejected.push((candidate, DurationRejection::TooLong));
            } else {
                kept.push(candidate);
            }
        }
        (kept, rejected)
    }

    fn starting(&self, onset: f64, active_count: u32, required: u32) -> RallyState {
        if active_count >= required {
            RallyState::InRally {
                onset,
                last_active: onset,
            }
        } else {
            RallyState::RallyStarting {
                onset,
                active_count,
            }
        }
    }

    fn candidate(&self, onset: f64, last_active: f64, stream_end: f64) -> CandidateInterval {
        let start = (onset - self.config.rally_start_padding).max(0.0);
        let end = (last_active + self.config.rally_end_padding).min(stream_end);
        CandidateInterval {
            range: TimeRange::new(start, end.max(last_active)),
            onset,
            last_active,
        }
    }
}

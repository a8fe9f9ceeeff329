// Analysis module - the five detection stages
//
// Pipeline: AudioAnalyzer + MovementAnalyzer (independent, read-only over the
// same media) → TemporalAnalyzer (state machine) → FeatureFusion (accept /
// reject) → ExcitementScorer (ranking). Every stage holds only an
// `Arc<ThresholdConfig>` and is safe to share across worker threads.

pub mod audio;
pub mod fusion;
pub mod movement;
pub mod scoring;
pub mod temporal;

pub use audio::{AudioAnalysis, AudioAnalyzer, AudioPeak};
pub use fusion::{FeatureFusion, FusedFeatures};
pub use movement::{FrameAnalysis, MovementAnalysis, MovementAnalyzer};
pub use scoring::{ExcitementScorer, ScoreBreakdown};
pub use temporal::{ActivitySignal, CandidateInterval, RallyState, TemporalAnalyzer};

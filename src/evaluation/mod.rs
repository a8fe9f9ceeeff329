//! Offline validation harness: annotation parsing and accuracy metrics.
//!
//! Nothing here is used by the engine; ground truth only ever flows into the
//! evaluator alongside a finished detection result.

pub mod accuracy;
pub mod ground_truth;

pub use accuracy::{AccuracyEvaluator, AccuracyMetrics, AccuracyReport, RallyMatch};
pub use ground_truth::{GroundTruthData, GroundTruthParser, GroundTruthRally};

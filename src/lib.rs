// Rally Detector Core - tennis rally segmentation and ranking
// Audio strike detection + player movement + temporal segmentation + fusion

// Module declarations
pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod media;
pub mod time_range;

// Re-exports for convenience
pub use config::ThresholdConfig;
pub use engine::{
    CancellationToken, DetectedRally, DetectionOutcome, DetectionProgress, DetectionStage,
    RallyDetectionEngine, RallyDetectionResult,
};
pub use error::{AnnotationError, ConfigError, DetectionError, ErrorCode, MediaError};
pub use evaluation::{AccuracyEvaluator, AccuracyMetrics, GroundTruthData, GroundTruthParser};
pub use media::MediaSource;
pub use time_range::{TimeRange, TimeSpan};

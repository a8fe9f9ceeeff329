// ExcitementScorer - 0-100 highlight ranking for accepted rallies
//
// Four sub-scores on a 0-100 scale:
//   duration   = min(duration / maxScoringDuration, 1) * 100
//   intensity  = (0.6 * peak + 0.4 * average movement intensity) * 100
//   hit rate   = (1 - exp(-2 * hitDensity / excitingHitRate)) * 100
//   continuity = continuity * 100
// base = Σ weight * sub-score; bonuses for long and very intense rallies,
// a penalty scaled by how far detection confidence sits below 1.
// final = clamp(base + bonus - penalty, 0, 100).
//
// Pure function of (rally measurements, config): no state between calls.

use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::ThresholdConfig;
use crate::engine::DetectedRally;

/// Share of the intensity sub-score taken by peak intensity
const PEAK_INTENSITY_SHARE: f64 = 0.6;

/// One weighted sub-score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreComponent {
    pub name: &'static str,
    /// Sub-score, [0, 100]
    pub value: f64,
    pub weight: f64,
}

impl ScoreComponent {
    pub fn contribution(&self) -> f64 {
        self.value * self.weight
    }
}

/// Full derivation of one rally's score
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub start_time: f64,
    pub end_time: f64,
    pub components: [ScoreComponent; 4],
    pub base: f64,
    pub bonus: f64,
    pub penalty: f64,
    pub final_score: f64,
}

impl ScoreBreakdown {
    /// Human-readable breakdown for threshold tuning
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Rally {:.1}s - {:.1}s ({:.1}s)",
            self.start_time,
            self.end_time,
            self.end_time - self.start_time
        );
        for component in &self.components {
            let _ = writeln!(
                out,
                "  {:<11} {:>6.1} x {:.2} = {:>6.2}",
                component.name,
                component.value,
                component.weight,
                component.contribution()
            );
        }
        let _ = writeln!(out, "  base        {:>6.2}", self.base);
        let _ = writeln!(out, "  bonus       {:>+6.2}", self.bonus);
        let _ = writeln!(out, "  penalty     {:>+6.2}", -self.penalty);
        let _ = writeln!(out, "  final       {:>6.1}", self.final_score);
        out
    }
}

/// Maps rally measurements to an excitement score
pub struct ExcitementScorer {
    config: Arc<ThresholdConfig>,
}

impl ExcitementScorer {
    pub fn new(config: Arc<ThresholdConfig>) -> Self {
        Self { config }
    }

    pub fn score(&self, rally: &DetectedRally) -> ScoreBreakdown {
        let config = &self.config;
        let m = rally.measurements();
        let duration = rally.duration();

        let duration_score = (duration / config.max_scoring_duration).clamp(0.0, 1.0) * 100.0;
        let intensity_score = (PEAK_INTENSITY_SHARE * m.peak_movement_intensity
            + (1.0 - PEAK_INTENSITY_SHARE) * m.avg_movement_intensity)
            .clamp(0.0, 1.0)
            * 100.0;
        let hit_score =
            (1.0 - (-2.0 * m.hit_density.max(0.0) / config.exciting_hit_rate).exp()) * 100.0;
        let continuity_score = m.continuity.clamp(0.0, 1.0) * 100.0;

        let components = [
            ScoreComponent {
                name: "duration",
                value: duration_score,
                weight: config.duration_weight,
            },
            ScoreComponent {
                name: "intensity",
                value: intensity_score,
                weight: config.intensity_weight,
            },
            ScoreComponent {
                name: "hit rate",
                value: hit_score,
                weight: config.hit_frequency_weight,
            },
            ScoreComponent {
                name: "continuity",
                value: continuity_score,
                weight: config.continuity_weight,
            },
        ];
        let base: f64 = components.iter().map(ScoreComponent::contribution).sum();

        let mut bonus = 0.0;
        if duration >= config.long_rally_bonus_duration {
            bonus += config.long_rally_bonus;
        }
        if m.peak_movement_intensity >= config.high_intensity_bonus_threshold {
            bonus += config.high_intensity_bonus;
        }
        let penalty =
            config.low_confidence_penalty * (1.0 - m.detection_confidence.clamp(0.0, 1.0));

        ScoreBreakdown {
            start_time: rally.start_time(),
            end_time: rally.end_time(),
            components,
            base,
            bonus,
            penalty,
            final_score: (base + bonus - penalty).clamp(0.0, 100.0),
        }
    }

    /// Score `rally` and store the result on it
    pub fn apply(&self, rally: &mut DetectedRally) -> ScoreBreakdown {
        let breakdown = self.score(rally);
        rally.set_excitement_score(breakdown.final_score);
        breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RallyMeasurements;

    fn measurements(hit_density: f64) -> RallyMeasurements {
        RallyMeasurements {
            detection_confidence: 0.8,
            avg_movement_intensity: 0.6,
            peak_movement_intensity: 0.9,
            hit_count: (hit_density * 12.0) as usize,
            hit_density,
            continuity: 0.9,
        }
    }

    fn scorer() -> ExcitementScorer {
        ExcitementScorer::new(Arc::new(ThresholdConfig::default()))
    }

    #[test]
    fn test_hit_density_changes_score() {
        let calm = DetectedRally::new(10.0, 22.0, measurements(0.5)).unwrap();
        let busy = DetectedRally::new(40.0, 52.0, measurements(1.5)).unwrap();
        let calm_score = scorer().score(&calm).final_score;
        let busy_score = scorer().score(&busy).final_score;
        assert!(busy_score > calm_score, "{busy_score} vs {calm_score}");
    }

    #[test]
    fn test_breakdown_adds_up() {
        let rally = DetectedRally::new(0.0, 24.0, measurements(1.2)).unwrap();
        let breakdown = scorer().score(&rally);

        assert!((breakdown.components[0].value - 80.0).abs() < 1e-9);
        assert!((breakdown.components[1].value - 78.0).abs() < 1e-9);
        assert!((breakdown.components[3].value - 90.0).abs() < 1e-9);
        // long rally + high intensity
        assert_eq!(breakdown.bonus, 10.0);
        assert!((breakdown.penalty - 2.0).abs() < 1e-9);
        let expected = (breakdown.base + 10.0 - 2.0).clamp(0.0, 100.0);
        assert!((breakdown.final_score - expected).abs() < 1e-9);
        assert!(breakdown.render().contains("hit rate"));
    }

    #[test]
    fn test_score_is_clamped_and_deterministic() {
        let maxed = RallyMeasurements {
            detection_confidence: 1.0,
            avg_movement_intensity: 1.0,
            peak_movement_intensity: 1.0,
            hit_count: 200,
            hit_density: 10.0,
            continuity: 1.0,
        };
        let mut rally = DetectedRally::new(0.0, 100.0, maxed).unwrap();
        let first = scorer().apply(&mut rally);
        assert_eq!(first.final_score, 100.0);
        assert_eq!(rally.excitement_score(), 100.0);
        assert_eq!(scorer().score(&rally), first);

        let empty = DetectedRally::new(0.0, 1.0, RallyMeasurements::default()).unwrap();
        assert_eq!(scorer().score(&empty).final_score, 0.0);
    }
}

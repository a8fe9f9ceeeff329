//! Detection accuracy against ground truth.
//!
//! Matching is greedy and order-dependent. Detections are visited in the
//! order given; each picks, among the ground-truth rallies whose start and
//! end both lie within `tolerance` of its own, the one with the smallest mean
//! boundary error. If that rally is still unclaimed the pair is a true
//! positive, otherwise the detection is a false positive (first claim wins).
//! Ground-truth rallies left unclaimed are false negatives.
//!
//! The boundary error recorded for a match is the Euclidean norm of the start
//! and end errors.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::time_range::{TimeRange, TimeSpan};

/// Default matching tolerance in seconds
pub const DEFAULT_TOLERANCE: f64 = 1.0;

/// Confusion counts and boundary statistics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyMetrics {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    /// Mean boundary error over true positives (seconds)
    pub average_boundary_error: f64,
    pub max_boundary_error: f64,
}

impl AccuracyMetrics {
    pub fn precision(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives,
        )
    }

    pub fn recall(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }

    pub fn f1_score(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }

    /// Share of real rallies found within tolerance (recall)
    pub fn accuracy(&self) -> f64 {
        self.recall()
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// One detection paired with a ground-truth rally
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RallyMatch {
    pub detected_index: usize,
    pub ground_truth_index: usize,
    pub detected: TimeRange,
    pub ground_truth: TimeRange,
    pub start_error: f64,
    pub end_error: f64,
    pub boundary_error: f64,
}

/// Full evaluation outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyReport {
    pub tolerance: f64,
    pub metrics: AccuracyMetrics,
    pub matches: Vec<RallyMatch>,
    /// Detections that matched nothing or lost their claim
    pub false_positives: Vec<(usize, TimeRange)>,
    /// Ground-truth rallies no detection claimed
    pub false_negatives: Vec<(usize, TimeRange)>,
}

impl AccuracyReport {
    pub fn render(&self) -> String {
        let m = &self.metrics;
        let mut out = String::new();
        let _ = writeln!(out, "=== Accuracy (tolerance {:.2}s) ===", self.tolerance);
        let _ = writeln!(
            out,
            "TP {}  FP {}  FN {}",
            m.true_positives, m.false_positives, m.false_negatives
        );
        let _ = writeln!(
            out,
            "precision {:.3}  recall {:.3}  F1 {:.3}  accuracy {:.1}%",
            m.precision(),
            m.recall(),
            m.f1_score(),
            m.accuracy() * 100.0
        );
        let _ = writeln!(
            out,
            "boundary error: average {:.3}s, max {:.3}s",
            m.average_boundary_error, m.max_boundary_error
        );
        for matched in &self.matches {
            let _ = writeln!(
                out,
                "  match  detected #{} {:.1}-{:.1}s <-> truth #{} {:.1}-{:.1}s (start {:+.2}s, end {:+.2}s)",
                matched.detected_index,
                matched.detected.start,
                matched.detected.end,
                matched.ground_truth_index,
                matched.ground_truth.start,
                matched.ground_truth.end,
                matched.start_error,
                matched.end_error
            );
        }
        for (index, range) in &self.false_positives {
            let _ = writeln!(
                out,
                "  FP     detected #{} {:.1}-{:.1}s",
                index, range.start, range.end
            );
        }
        for (index, range) in &self.false_negatives {
            let _ = writeln!(
                out,
                "  FN     truth #{} {:.1}-{:.1}s",
                index, range.start, range.end
            );
        }
        out
    }
}

/// Greedy first-claim matcher
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyEvaluator {
    tolerance: f64,
}

impl Default for AccuracyEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl AccuracyEvaluator {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.max(0.0),
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Match `detected` (in the given order) against `ground_truth`
    pub fn evaluate<D: TimeSpan, G: TimeSpan>(
        &self,
        detected: &[D],
        ground_truth: &[G],
    ) -> AccuracyReport {
        let truth: Vec<TimeRange> = ground_truth.iter().map(TimeSpan::span).collect();
        let mut claimed = vec![false; truth.len()];
        let mut matches = Vec::new();
        let mut false_positives = Vec::new();

        for (detected_index, detection) in detected.iter().enumerate() {
            let span = detection.span();
            let best = truth
                .iter()
                .enumerate()
                .filter_map(|(index, gt)| {
                    let start_error = span.start - gt.start;
                    let end_error = span.end - gt.end;
                    let within = start_error.abs() <= self.tolerance
                        && end_error.abs() <= self.tolerance;
                    within.then_some((index, start_error, end_error))
                })
                .min_by(|a, b| {
                    let mean_a = (a.1.abs() + a.2.abs()) / 2.0;
                    let mean_b = (b.1.abs() + b.2.abs()) / 2.0;
                    mean_a.total_cmp(&mean_b)
                });

            match best {
                Some((index, start_error, end_error)) if !claimed[index] => {
                    claimed[index] = true;
                    matches.push(RallyMatch {
                        detected_index,
                        ground_truth_index: index,
                        detected: span,
                        ground_truth: truth[index],
                        start_error,
                        end_error,
                        boundary_error: start_error.hypot(end_error),
                    });
                }
                _ => false_positives.push((detected_index, span)),
            }
        }

        let false_negatives: Vec<(usize, TimeRange)> = truth
            .iter()
            .enumerate()
            .filter(|(index, _)| !claimed[*index])
            .map(|(index, range)| (index, *range))
            .collect();

        let errors: Vec<f64> = matches.iter().map(|m| m.boundary_error).collect();
        let metrics = AccuracyMetrics {
            true_positives: matches.len(),
            false_positives: false_positives.len(),
            false_negatives: false_negatives.len(),
            average_boundary_error: if errors.is_empty() {
                0.0
            } else {
                errors.iter().sum::<f64>() / errors.len() as f64
            },
            max_boundary_error: errors.iter().copied().fold(0.0, f64::max),
        };

        AccuracyReport {
            tolerance: self.tolerance,
            metrics,
            matches,
            false_positives,
            false_negatives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(pairs: &[(f64, f64)]) -> Vec<TimeRange> {
        pairs.iter().map(|&(s, e)| TimeRange::new(s, e)).collect()
    }

    #[test]
    fn test_closest_candidate_wins() {
        // Both truths qualify; the second has the smaller mean error
        let truth = ranges(&[(9.2, 20.0), (10.1, 19.8)]);
        let detected = ranges(&[(10.0, 20.0)]);
        let report = AccuracyEvaluator::new(1.0).evaluate(&detected, &truth);
        assert_eq!(report.matches[0].ground_truth_index, 1);
        assert_eq!(report.false_negatives, vec![(0, truth[0])]);
    }

    #[test]
    fn test_zero_denominators() {
        let metrics = AccuracyMetrics::default();
        assert_eq!(metrics.precision(), 0.0);
        assert_eq!(metrics.recall(), 0.0);
        assert_eq!(metrics.f1_score(), 0.0);

        let empty: Vec<TimeRange> = Vec::new();
        let report = AccuracyEvaluator::default().evaluate(&empty, &ranges(&[(0.0, 5.0)]));
        assert_eq!(report.metrics.false_negatives, 1);
        assert_eq!(report.metrics.accuracy(), 0.0);
    }

    #[test]
    fn test_boundary_error_is_euclidean() {
        let report = AccuracyEvaluator::new(1.0)
            .evaluate(&ranges(&[(13.0, 24.0)]), &ranges(&[(12.4, 24.8)]));
        assert!((report.matches[0].boundary_error - 1.0).abs() < 1e-9);
        assert!((report.metrics.max_boundary_error - 1.0).abs() < 1e-9);
        assert!(report.render().contains("TP 1  FP 0  FN 0"));
    }
}

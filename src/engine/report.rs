// Human-readable diagnostics for operators tuning thresholds
//
// Rendering reads the result and the configuration; it never touches either.

use std::fmt::Write as _;

use crate::config::ThresholdConfig;
use crate::engine::result::RallyDetectionResult;

/// Text report over one detection result
pub struct DiagnosticReport<'a> {
    config: &'a ThresholdConfig,
    result: &'a RallyDetectionResult,
}

impl<'a> DiagnosticReport<'a> {
    pub fn new(config: &'a ThresholdConfig, result: &'a RallyDetectionResult) -> Self {
        Self { config, result }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_header(&mut out);
        self.write_config(&mut out);
        self.write_analysis(&mut out);
        self.write_candidates(&mut out);
        self.write_rallies(&mut out);
        out
    }

    fn write_header(&self, out: &mut String) {
        let result = self.result;
        let speed = if result.processing_time > 0.0 {
            result.video_duration / result.processing_time
        } else {
            0.0
        };
        let _ = writeln!(out, "=== Rally Detection Report: {} ===", result.video_id);
        let _ = writeln!(
            out,
            "Video duration: {:.1}s, processed in {:.2}s ({:.1}x real time)",
            result.video_duration, result.processing_time, speed
        );
        if result.audio_available {
            let _ = writeln!(out, "Audio: available");
        } else {
            let _ = writeln!(out, "Audio: unavailable (movement-only detection)");
        }
    }

    fn write_config(&self, out: &mut String) {
        let c = self.config;
        let _ = writeln!(out, "\nConfiguration:");
        let _ = writeln!(
            out,
            "  audio: window {} hop {} band {:.0}-{:.0} Hz amplitude > {:.2} confidence > {:.2}",
            c.fft_window_size,
            c.audio_hop_size,
            c.hit_frequency_min,
            c.hit_frequency_max,
            c.audio_amplitude_threshold,
            c.hit_confidence_threshold
        );
        let _ = writeln!(
            out,
            "  movement: {:.1} fps, activity >= {:.2}, pose confidence >= {:.2}",
            c.video_analysis_fps, c.movement_intensity_threshold, c.pose_confidence_threshold
        );
        let _ = writeln!(
            out,
            "  temporal: start after {} frames, pause {:.1}-{:.1}s, duration {:.1}-{:.1}s",
            c.rally_start_frame_count,
            c.min_pause_duration_to_end,
            c.max_pause_duration,
            c.min_rally_duration,
            c.max_rally_duration
        );
        let _ = writeln!(
            out,
            "  fusion: video {:.2} audio {:.2} temporal {:.2}, sync {:+.3}s, accept >= {:.2}",
            c.video_weight,
            c.audio_weight,
            c.temporal_weight,
            c.audio_video_sync_offset,
            c.min_combined_confidence
        );
    }

    fn write_analysis(&self, out: &mut String) {
        let d = &self.result.diagnostics;
        let _ = writeln!(out, "\nAnalysis ({} chunk(s)):", d.chunk_count);
        let _ = writeln!(
            out,
            "  frames: {} sampled, {} low-confidence, {} without a person ({:.2}s)",
            d.frames_analysed, d.low_confidence_frames, d.frames_without_person, d.movement_seconds
        );
        if self.result.audio_available {
            let _ = writeln!(
                out,
                "  audio: {} windows, {} peaks, {} hit sounds ({:.2}s)",
                d.audio_windows, d.audio_peaks, d.hit_sounds, d.audio_seconds
            );
        }
    }

    fn write_candidates(&self, out: &mut String) {
        let d = &self.result.diagnostics;
        let _ = writeln!(
            out,
            "\nCandidates: {} raw, {} after merge, {} accepted, {} rejected",
            d.raw_candidates,
            d.merged_candidates,
            self.result.count(),
            d.rejected.len()
        );
        for rejected in &d.rejected {
            let _ = writeln!(
                out,
                "  rejected {:>7.1}s - {:>7.1}s: {}",
                rejected.range.start, rejected.range.end, rejected.reason
            );
        }
    }

    fn write_rallies(&self, out: &mut String) {
        let result = self.result;
        let _ = writeln!(out, "\nRallies ({}):", result.count());
        if result.is_empty() {
            let _ = writeln!(out, "  none");
            return;
        }
        let _ = writeln!(
            out,
            "  {:>3}  {:>8}  {:>8}  {:>6}  {:>5}  {:>4}  {:>5}",
            "#", "start", "end", "length", "conf", "hits", "score"
        );
        for (index, rally) in result.rallies.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {:>3}  {:>8.1}  {:>8.1}  {:>6.1}  {:>5.2}  {:>4}  {:>5.1}",
                index + 1,
                rally.start_time(),
                rally.end_time(),
                rally.duration(),
                rally.detection_confidence(),
                rally.hit_count(),
                rally.excitement_score()
            );
        }
        let _ = writeln!(
            out,
            "  total {:.1}s, average {:.1}s",
            result.total_rally_time(),
            result.average_duration()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::result::{
        DetectedRally, DetectionDiagnostics, RallyMeasurements, RejectedCandidate,
        RejectionReason,
    };
    use crate::time_range::TimeRange;

    #[test]
    fn test_report_lists_rallies_and_rejections() {
        let config = ThresholdConfig::default();
        let result = RallyDetectionResult {
            video_id: "court-3".to_string(),
            video_duration: 120.0,
            rallies: vec![DetectedRally::new(10.0, 25.0, RallyMeasurements::default()).unwrap()],
            processing_time: 2.0,
            audio_available: false,
            diagnostics: DetectionDiagnostics {
                rejected: vec![RejectedCandidate {
                    range: TimeRange::new(40.0, 42.0),
                    reason: RejectionReason::TooShort { duration: 2.0 },
                }],
                ..DetectionDiagnostics::default()
            },
        };

        let text = DiagnosticReport::new(&config, &result).render();
        assert!(text.contains("court-3"));
        assert!(text.contains("60.0x real time"));
        assert!(text.contains("movement-only"));
        assert!(text.contains("too short (2.0s)"));
        assert!(text.contains("Rallies (1)"));
    }
}

//! Hand-annotated reference rallies.
//!
//! Annotation files look like
//!
//! ```json
//! { "video": "match.mp4",
//!   "rallies": [ { "startTime": 10.0, "endTime": 25.0, "excitementScore": 70, "notes": "lob" } ],
//!   "metadata": { "annotator": "jd" } }
//! ```
//!
//! `video` resolves relative to the annotation file's own directory.
//! Parsing only fails when the document cannot be read; content problems are
//! returned together by [`GroundTruthData::validate`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{AnnotationError, AnnotationIssue, AnnotationIssueKind};
use crate::time_range::{TimeRange, TimeSpan};

/// One annotated rally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundTruthRally {
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excitement_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TimeSpan for GroundTruthRally {
    fn span(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

/// Annotation document for one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthData {
    pub video: String,
    pub rallies: Vec<GroundTruthRally>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    /// Directory of the file this was parsed from
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

impl GroundTruthData {
    /// Video path, resolved against the annotation file's directory
    pub fn video_path(&self) -> PathBuf {
        let video = Path::new(&self.video);
        match &self.source_dir {
            Some(dir) if video.is_relative() => dir.join(video),
            _ => video.to_path_buf(),
        }
    }

    /// Every consistency problem in the document, in file order
    pub fn validate(&self) -> Vec<AnnotationIssue> {
        let mut issues = Vec::new();
        let mut well_formed = Vec::new();

        for (index, rally) in self.rallies.iter().enumerate() {
            if !rally.start_time.is_finite() || !rally.end_time.is_finite() {
                issues.push(issue(
                    AnnotationIssueKind::NonFinite,
                    index,
                    None,
                    "start and end must be finite numbers".to_string(),
                ));
                continue;
            }
            let mut ok = true;
            if rally.start_time < 0.0 {
                ok = false;
                issues.push(issue(
                    AnnotationIssueKind::NegativeStart,
                    index,
                    None,
                    format!("startTime {:.3} is negative", rally.start_time),
                ));
            }
            if rally.start_time >= rally.end_time {
                ok = false;
                issues.push(issue(
                    AnnotationIssueKind::EmptyInterval,
                    index,
                    None,
                    format!(
                        "startTime {:.3} is not before endTime {:.3}",
                        rally.start_time, rally.end_time
                    ),
                ));
            }
            if let Some(score) = rally.excitement_score {
                if !(0.0..=100.0).contains(&score) {
                    issues.push(issue(
                        AnnotationIssueKind::ScoreOutOfRange,
                        index,
                        None,
                        format!("excitementScore {score} is outside [0, 100]"),
                    ));
                }
            }
            if ok {
                well_formed.push(index);
            }
        }

        for (pos, &later) in well_formed.iter().enumerate() {
            for &earlier in &well_formed[..pos] {
                let a = self.rallies[earlier].span();
                let b = self.rallies[later].span();
                if a.overlaps(&b) {
                    issues.push(issue(
                        AnnotationIssueKind::Overlap,
                        later,
                        Some(earlier),
                        format!(
                            "{:.3}-{:.3}s overlaps rally #{} ({:.3}-{:.3}s)",
                            b.start, b.end, earlier, a.start, a.end
                        ),
                    ));
                }
            }
        }

        issues.sort_by_key(|issue| issue.rally_index);
        issues
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

fn issue(
    kind: AnnotationIssueKind,
    rally_index: usize,
    other_index: Option<usize>,
    message: String,
) -> AnnotationIssue {
    AnnotationIssue {
        kind,
        rally_index,
        other_index,
        message,
    }
}

/// Reads annotation documents
pub struct GroundTruthParser;

impl GroundTruthParser {
    /// Parse an annotation file; `video` will resolve against its directory
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<GroundTruthData, AnnotationError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|err| AnnotationError::Io {
            path: label.clone(),
            details: err.to_string(),
        })?;
        let mut data = Self::parse_str(&contents, &label)?;
        data.source_dir = Some(
            path.parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        );
        tracing::info!(
            "[GroundTruthParser] Loaded {} rallies for {} from {}",
            data.rallies.len(),
            data.video,
            label
        );
        Ok(data)
    }

    /// Parse annotation JSON; `label` names the source in errors
    pub fn parse_str(data: &str, label: &str) -> Result<GroundTruthData, AnnotationError> {
        serde_json::from_str(data).map_err(|err| AnnotationError::Parse {
            path: label.to_string(),
            details: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rally(start: f64, end: f64) -> GroundTruthRally {
        GroundTruthRally {
            start_time: start,
            end_time: end,
            excitement_score: None,
            notes: None,
        }
    }

    fn data(rallies: Vec<GroundTruthRally>) -> GroundTruthData {
        GroundTruthData {
            video: "match.mp4".to_string(),
            rallies,
            metadata: None,
            source_dir: None,
        }
    }

    #[test]
    fn test_parse_document() {
        let json = r#"{
            "video": "clips/match.mp4",
            "rallies": [
                { "startTime": 10.0, "endTime": 25.0, "excitementScore": 72, "notes": "long baseline exchange" },
                { "startTime": 40.0, "endTime": 55.0 }
            ],
            "metadata": { "annotator": "coach", "court": "3" }
        }"#;
        let data = GroundTruthParser::parse_str(json, "inline").unwrap();
        assert_eq!(data.rallies.len(), 2);
        assert_eq!(data.rallies[0].excitement_score, Some(72.0));
        assert_eq!(data.rallies[1].notes, None);
        assert_eq!(data.metadata.as_ref().unwrap()["court"], "3");
        assert!(data.is_valid());
    }

    #[test]
    fn test_all_issues_reported_at_once() {
        let mut bad_score = rally(60.0, 70.0);
        bad_score.excitement_score = Some(140.0);
        let data = data(vec![
            rally(-1.0, 5.0),
            rally(20.0, 15.0),
            rally(30.0, 45.0),
            rally(40.0, 50.0),
            bad_score,
            rally(f64::NAN, 3.0),
        ]);

        let issues = data.validate();
        let kinds: Vec<(usize, AnnotationIssueKind)> =
            issues.iter().map(|i| (i.rally_index, i.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (0, AnnotationIssueKind::NegativeStart),
                (1, AnnotationIssueKind::EmptyInterval),
                (3, AnnotationIssueKind::Overlap),
                (4, AnnotationIssueKind::ScoreOutOfRange),
                (5, AnnotationIssueKind::NonFinite),
            ]
        );
        assert_eq!(issues[2].other_index, Some(2));
        assert!(issues[2].to_string().starts_with("rally #3:"));
    }

    #[test]
    fn test_touching_rallies_do_not_overlap() {
        assert!(data(vec![rally(0.0, 10.0), rally(10.0, 20.0)]).is_valid());
    }

    #[test]
    fn test_video_resolves_against_annotation_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match.json");
        std::fs::write(&path, r#"{ "video": "match.mp4", "rallies": [] }"#).unwrap();

        let data = GroundTruthParser::parse_file(&path).unwrap();
        assert_eq!(data.video_path(), dir.path().join("match.mp4"));

        let mut absolute = data.clone();
        absolute.video = "/videos/match.mp4".to_string();
        assert_eq!(absolute.video_path(), PathBuf::from("/videos/match.mp4"));
    }

    #[test]
    fn test_unreadable_and_malformed_files() {
        assert!(matches!(
            GroundTruthParser::parse_file("/nonexistent/annotations.json"),
            Err(AnnotationError::Io { .. })
        ));
        assert!(matches!(
            GroundTruthParser::parse_str("{ \"rallies\": [] }", "inline"),
            Err(AnnotationError::Parse { .. })
        ));
    }
}

// Chunk planning and cross-chunk candidate merging

use crate::analysis::temporal::CandidateInterval;
use crate::config::ThresholdConfig;
use crate::time_range::TimeRange;

/// Videos shorter than this many chunk lengths run in a single pass
const CHUNKING_MIN_RATIO: f64 = 1.25;

/// Split `[0, duration)` into analysis chunks
///
/// Chunk edges are aligned to the movement sampling grid so every sampled
/// frame lands in exactly one chunk. Short videos (or chunking disabled)
/// yield a single chunk.
pub fn plan_chunks(duration: f64, config: &ThresholdConfig) -> Vec<TimeRange> {
    let whole = vec![TimeRange::new(0.0, duration)];
    if !config.enable_chunking || duration <= config.chunk_duration * CHUNKING_MIN_RATIO {
        return whole;
    }

    let fps = config.video_analysis_fps;
    let frames_per_chunk = (config.chunk_duration * fps).round().max(1.0);
    let mut chunks = Vec::new();
    let mut index = 0.0f64;
    loop {
        let start = index * frames_per_chunk / fps;
        if start >= duration {
            break;
        }
        let end = ((index + 1.0) * frames_per_chunk / fps).min(duration);
        chunks.push(TimeRange::new(start, end));
        index += 1.0;
    }

    // Fold a sliver of a final chunk into its predecessor.
    if chunks.len() >= 2 {
        let last = chunks[chunks.len() - 1];
        if last.duration() < config.chunk_duration * (CHUNKING_MIN_RATIO - 1.0) {
            chunks.pop();
            if let Some(previous) = chunks.last_mut() {
                previous.end = last.end;
            }
        }
    }
    chunks
}

/// Merge candidates that belong to the same rally
///
/// Two candidates are joined when their padded ranges overlap or sit within
/// `max_gap` of each other, or when the pause between the last activity of
/// one and the onset of the next is shorter than `min_pause`. A single
/// segmentation pass never emits two candidates that close together, so the
/// second rule only fires for a rally cut open by a chunk edge.
///
/// Input may come from several chunks in any order; output is chronological.
pub fn merge_candidates(
    mut candidates: Vec<CandidateInterval>,
    max_gap: f64,
    min_pause: f64,
) -> Vec<CandidateInterval> {
    candidates.sort_by(|a, b| a.range.start.total_cmp(&b.range.start));
    let mut merged: Vec<CandidateInterval> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match merged.last_mut() {
            Some(last)
                if last.range.gap_to(&candidate.range) <= max_gap
                    || candidate.onset - last.last_active < min_pause =>
            {
                *last = last.merge(&candidate);
            }
            _ => merged.push(candidate),
        }
    }
    merged
}

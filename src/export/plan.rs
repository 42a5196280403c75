//! Segment planning
//!
//! Converts the ordered track list into a gap-free, non-overlapping sequence
//! of time segments covering `[0, composition_duration)`, each annotated with
//! the zero-or-one clip active per track.

use crate::timeline::{TimelineClip, Track};

/// Boundary de-duplication and zero-length tolerance, in seconds.
/// Well below one frame interval at any practical frame rate.
pub(crate) const TIME_EPSILON: f64 = 1e-6;

/// A maximal interval during which the set of active clips per track is
/// constant. Engine-internal; created and destroyed within one export call.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Interval start on the timeline (inclusive)
    pub start_time: f64,

    /// Interval end on the timeline (exclusive)
    pub end_time: f64,

    /// Active clip per track, parallel to the track list
    pub lanes: Vec<Option<TimelineClip>>,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Track indices and clips active during this segment, in track order
    pub fn active_lanes(&self) -> impl Iterator<Item = (usize, &TimelineClip)> {
        self.lanes
            .iter()
            .enumerate()
            .filter_map(|(index, lane)| lane.as_ref().map(|clip| (index, clip)))
    }

    pub fn active_count(&self) -> usize {
        self.lanes.iter().filter(|lane| lane.is_some()).count()
    }

    /// True when no clip is active on any track (gap fill territory)
    pub fn is_gap(&self) -> bool {
        self.active_count() == 0
    }
}

/// Build the ordered segment plan for the given tracks.
///
/// Boundaries are the sorted, de-duplicated union of `{0, duration}` and
/// every clip's effective start/end, with overlay clip ends capped at the
/// composition duration. Deterministic: identical input yields an identical,
/// order-stable plan.
pub fn plan_segments(tracks: &[Track], duration: f64) -> Vec<Segment> {
    if duration <= TIME_EPSILON {
        return Vec::new();
    }

    let mut boundaries = vec![0.0, duration];
    for (index, track) in tracks.iter().enumerate() {
        for clip in &track.clips {
            let end = effective_end(index, clip, duration);
            for t in [clip.start_time, end] {
                if t > TIME_EPSILON && t < duration - TIME_EPSILON {
                    boundaries.push(t);
                }
            }
        }
    }

    boundaries.sort_by(|a, b| a.partial_cmp(b).expect("boundary times are finite"));
    boundaries.dedup_by(|a, b| (*a - *b).abs() < TIME_EPSILON);

    let mut segments = Vec::with_capacity(boundaries.len().saturating_sub(1));
    for pair in boundaries.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if end - start < TIME_EPSILON {
            continue;
        }

        // Clips within a track never overlap, so a linear scan finds the
        // single active clip per track.
        let lanes = tracks
            .iter()
            .enumerate()
            .map(|(index, track)| {
                track
                    .clips
                    .iter()
                    .find(|clip| {
                        clip.start_time < end - TIME_EPSILON
                            && effective_end(index, clip, duration) > start + TIME_EPSILON
                    })
                    .cloned()
            })
            .collect();

        segments.push(Segment {
            start_time: start,
            end_time: end,
            lanes,
        });
    }

    segments
}

/// Overlay clips are logically truncated to the composition duration; the
/// base track defines that duration and is never capped.
fn effective_end(track_index: usize, clip: &TimelineClip, duration: f64) -> f64 {
    if track_index == 0 {
        clip.end_time
    } else {
        clip.effective_end(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{OverlayPosition, VideoClip};
    use std::path::PathBuf;

    fn source() -> VideoClip {
        VideoClip::new(PathBuf::from("/media/in.mp4"), 60.0, 1920, 1080, 30.0)
    }

    fn clip(start: f64, end: f64) -> TimelineClip {
        let src = source();
        TimelineClip {
            start_time: start,
            end_time: end,
            trim_end: end - start,
            ..TimelineClip::place(&src, start)
        }
    }

    fn track_with(clips: Vec<TimelineClip>) -> Track {
        Track {
            clips,
            ..Track::video()
        }
    }

    fn overlay_with(clips: Vec<TimelineClip>) -> Track {
        Track {
            clips,
            ..Track::overlay(OverlayPosition::default())
        }
    }

    fn assert_partitions(segments: &[Segment], duration: f64) {
        assert!(!segments.is_empty());
        assert_eq!(segments[0].start_time, 0.0);
        assert_eq!(segments.last().unwrap().end_time, duration);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
        for seg in segments {
            assert!(seg.duration() > TIME_EPSILON);
        }
    }

    #[test]
    fn single_clip_yields_single_segment() {
        let tracks = vec![track_with(vec![clip(0.0, 10.0)])];
        let segments = plan_segments(&tracks, 10.0);

        assert_eq!(segments.len(), 1);
        assert_partitions(&segments, 10.0);
        assert_eq!(segments[0].active_count(), 1);
    }

    #[test]
    fn leading_gap_produces_gap_segment() {
        let tracks = vec![track_with(vec![clip(5.0, 10.0)])];
        let segments = plan_segments(&tracks, 10.0);

        assert_eq!(segments.len(), 2);
        assert_partitions(&segments, 10.0);
        assert!(segments[0].is_gap());
        assert_eq!(segments[0].end_time, 5.0);
        assert_eq!(segments[1].active_count(), 1);
    }

    #[test]
    fn gap_between_clips_is_covered() {
        let tracks = vec![track_with(vec![clip(0.0, 3.0), clip(7.0, 12.0)])];
        let segments = plan_segments(&tracks, 12.0);

        assert_eq!(segments.len(), 3);
        assert_partitions(&segments, 12.0);
        assert!(segments[1].is_gap());
        assert_eq!((segments[1].start_time, segments[1].end_time), (3.0, 7.0));
    }

    #[test]
    fn overlapping_overlay_splits_segments() {
        let tracks = vec![
            track_with(vec![clip(0.0, 10.0)]),
            overlay_with(vec![clip(2.0, 6.0)]),
        ];
        let segments = plan_segments(&tracks, 10.0);

        assert_eq!(segments.len(), 3);
        assert_partitions(&segments, 10.0);
        assert_eq!(segments[0].active_count(), 1);
        assert_eq!(segments[1].active_count(), 2);
        assert_eq!(segments[2].active_count(), 1);
        assert!(segments[1].lanes[1].is_some());
    }

    #[test]
    fn overlay_end_is_capped_at_composition_duration() {
        let tracks = vec![
            track_with(vec![clip(0.0, 8.0)]),
            overlay_with(vec![clip(4.0, 20.0)]),
        ];
        let segments = plan_segments(&tracks, 8.0);

        assert_partitions(&segments, 8.0);
        // No boundary at 20.0; overlay active through to the capped end.
        assert_eq!(segments.last().unwrap().end_time, 8.0);
        assert!(segments.last().unwrap().lanes[1].is_some());
    }

    #[test]
    fn overlay_entirely_past_duration_contributes_nothing() {
        let tracks = vec![
            track_with(vec![clip(0.0, 5.0)]),
            overlay_with(vec![clip(10.0, 15.0)]),
        ];
        let segments = plan_segments(&tracks, 5.0);

        assert_eq!(segments.len(), 1);
        assert!(segments[0].lanes[1].is_none());
    }

    #[test]
    fn duplicate_boundaries_are_merged() {
        // Base clip ends exactly where the overlay starts.
        let tracks = vec![
            track_with(vec![clip(0.0, 4.0), clip(4.0, 8.0)]),
            overlay_with(vec![clip(4.0, 8.0)]),
        ];
        let segments = plan_segments(&tracks, 8.0);

        assert_eq!(segments.len(), 2);
        assert_partitions(&segments, 8.0);
    }

    #[test]
    fn plan_is_deterministic() {
        let tracks = vec![
            track_with(vec![clip(0.0, 3.0), clip(5.0, 9.0)]),
            overlay_with(vec![clip(1.0, 6.0)]),
        ];
        let first = plan_segments(&tracks, 9.0);
        let second = plan_segments(&tracks, 9.0);
        assert_eq!(first, second);
    }

    #[test]
    fn zero_duration_plans_nothing() {
        let tracks = vec![track_with(vec![])];
        assert!(plan_segments(&tracks, 0.0).is_empty());
    }
}

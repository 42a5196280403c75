//! Timeline schema definitions
//!
//! These types mirror the editor's timeline document. The editor owns and
//! mutates them; the export engine receives them by value for the duration
//! of a single export call.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

// =============================================================================
// Source Media
// =============================================================================

/// A source media file from the project library.
///
/// Immutable once imported. The export engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoClip {
    /// Unique clip ID
    pub id: String,

    /// Absolute path to the media file
    pub path: PathBuf,

    /// Duration in seconds
    pub duration: f64,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Frame rate
    pub fps: f64,
}

impl VideoClip {
    /// Create a new library entry for a media file
    pub fn new(path: PathBuf, duration: f64, width: u32, height: u32, fps: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            path,
            duration,
            width,
            height,
            fps,
        }
    }
}

// =============================================================================
// Overlay Placement
// =============================================================================

/// Placement of an overlay track's video on the output canvas.
///
/// Coordinates are fractions of the canvas; `scale` is the fraction of the
/// canvas width the overlay occupies. Height is derived from the overlay
/// source's aspect ratio.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPosition {
    pub center_x: f64,
    pub center_y: f64,
    pub scale: f64,
}

impl Default for OverlayPosition {
    fn default() -> Self {
        Self {
            center_x: 0.85,
            center_y: 0.85,
            scale: 0.25,
        }
    }
}

// =============================================================================
// Timeline Clips
// =============================================================================

/// A clip placed on the timeline.
///
/// `start_time`/`end_time` are the placement on the timeline;
/// `trim_start`/`trim_end` are the window into the source media.
/// All times are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineClip {
    pub id: String,

    /// ID of the source [`VideoClip`] in the library
    pub video_clip_id: String,

    /// Timeline placement start (inclusive)
    pub start_time: f64,

    /// Timeline placement end (exclusive)
    pub end_time: f64,

    /// Trim window start within the source
    pub trim_start: f64,

    /// Trim window end within the source
    pub trim_end: f64,

    /// Un-trimmed duration of the source when the clip was placed
    pub original_duration: f64,
}

impl TimelineClip {
    /// Place a source clip on the timeline at `start_time`, untrimmed
    pub fn place(source: &VideoClip, start_time: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            video_clip_id: source.id.clone(),
            start_time,
            end_time: start_time + source.duration,
            trim_start: 0.0,
            trim_end: source.duration,
            original_duration: source.duration,
        }
    }

    /// Duration of the clip on the timeline
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Whether the trim window is narrower than the original source
    pub fn is_trimmed(&self) -> bool {
        self.trim_start > 0.0 || self.trim_end < self.original_duration
    }

    /// Timeline end, capped at `limit` (used for overlay clips, whose
    /// effective end never exceeds the composition duration)
    pub fn effective_end(&self, limit: f64) -> f64 {
        self.end_time.min(limit)
    }
}

// =============================================================================
// Tracks
// =============================================================================

/// Track content kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
}

/// A single track of clips.
///
/// Track index 0 is the base track; every other track is an overlay track
/// composited on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,

    pub kind: TrackKind,

    /// Muted tracks contribute no audio to the output
    pub muted: bool,

    /// Audio volume multiplier (0.0 - 1.0)
    pub volume: f64,

    /// Canvas placement, meaningful only for overlay tracks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayPosition>,

    /// Clips in timeline order; clips within a track never overlap
    pub clips: Vec<TimelineClip>,
}

impl Track {
    /// Create an empty video track
    pub fn video() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: TrackKind::Video,
            muted: false,
            volume: 1.0,
            overlay: None,
            clips: Vec::new(),
        }
    }

    /// Create an empty overlay track at the given canvas position
    pub fn overlay(position: OverlayPosition) -> Self {
        Self {
            overlay: Some(position),
            ..Self::video()
        }
    }

    pub fn has_clips(&self) -> bool {
        !self.clips.is_empty()
    }
}

// =============================================================================
// Timeline
// =============================================================================

/// The full multi-track arrangement handed to the export engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    /// Total duration as tracked by the editor (seconds)
    pub duration: f64,

    /// Ordered tracks; index 0 is the base track
    pub tracks: Vec<Track>,
}

impl Timeline {
    pub fn new(tracks: Vec<Track>) -> Self {
        let mut timeline = Self {
            duration: 0.0,
            tracks,
        };
        timeline.duration = timeline.composition_duration();
        timeline
    }

    /// The base track, if any tracks exist
    pub fn base_track(&self) -> Option<&Track> {
        self.tracks.first()
    }

    /// Overlay tracks in compositing order (track 1, track 2, ...)
    pub fn overlay_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().skip(1)
    }

    /// Composition duration: the max clip end on the base track only.
    ///
    /// Overlay clips extending past this point are truncated at render
    /// time, never mutated.
    pub fn composition_duration(&self) -> f64 {
        self.base_track()
            .map(|track| {
                track
                    .clips
                    .iter()
                    .map(|clip| clip.end_time)
                    .fold(0.0, f64::max)
            })
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(duration: f64) -> VideoClip {
        VideoClip::new(PathBuf::from("/media/in.mp4"), duration, 1920, 1080, 30.0)
    }

    fn clip_at(source: &VideoClip, start: f64, end: f64) -> TimelineClip {
        TimelineClip {
            end_time: end,
            ..TimelineClip::place(source, start)
        }
    }

    #[test]
    fn composition_duration_ignores_overlay_tracks() {
        let src = source(20.0);
        let mut base = Track::video();
        base.clips.push(clip_at(&src, 0.0, 8.0));
        let mut overlay = Track::overlay(OverlayPosition::default());
        overlay.clips.push(clip_at(&src, 0.0, 15.0));

        let timeline = Timeline::new(vec![base, overlay]);
        assert_eq!(timeline.composition_duration(), 8.0);
    }

    #[test]
    fn composition_duration_empty_base_is_zero() {
        let timeline = Timeline::new(vec![Track::video()]);
        assert_eq!(timeline.composition_duration(), 0.0);
    }

    #[test]
    fn untrimmed_placement_is_not_trimmed() {
        let src = source(10.0);
        let clip = TimelineClip::place(&src, 2.0);
        assert!(!clip.is_trimmed());
        assert_eq!(clip.duration(), 10.0);

        let trimmed = TimelineClip {
            trim_start: 1.0,
            ..clip
        };
        assert!(trimmed.is_trimmed());
    }

    #[test]
    fn effective_end_caps_at_limit() {
        let src = source(30.0);
        let clip = clip_at(&src, 5.0, 25.0);
        assert_eq!(clip.effective_end(10.0), 10.0);
        assert_eq!(clip.effective_end(40.0), 25.0);
    }

    #[test]
    fn serializes_camel_case_for_the_editor() {
        let src = source(10.0);
        let clip = TimelineClip::place(&src, 2.0);
        let json = serde_json::to_value(&clip).unwrap();
        assert!(json.get("videoClipId").is_some());
        assert!(json.get("startTime").is_some());
        assert!(json.get("trimEnd").is_some());

        let track = Track::overlay(OverlayPosition::default());
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["kind"], "video");
        assert!(json["overlay"]["centerX"].is_number());

        // Base tracks omit the overlay placement entirely.
        let json = serde_json::to_value(&Track::video()).unwrap();
        assert!(json.get("overlay").is_none());
    }
}

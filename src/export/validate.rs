//! Timeline validation
//!
//! Fail-fast checks run before any subprocess is spawned or temp file
//! created. Any single violation aborts with the offending clip and track
//! named in the error.

use crate::export::types::ExportError;
use crate::timeline::{Timeline, VideoClip};
use std::collections::HashMap;
use std::fs::File;

/// Validate a timeline against the resolved media library.
///
/// Checks, in order: at least one video track exists; at least one track has
/// clips; every clip reference resolves; every referenced source file is
/// readable; trim bounds are self-consistent and inside the source.
pub fn validate_timeline(
    timeline: &Timeline,
    library: &HashMap<String, VideoClip>,
) -> Result<(), ExportError> {
    if timeline.tracks.is_empty() {
        return Err(ExportError::Validation(
            "timeline has no video tracks".to_string(),
        ));
    }

    if !timeline.tracks.iter().any(|track| track.has_clips()) {
        return Err(ExportError::Validation(
            "timeline has no clips on any track".to_string(),
        ));
    }

    for track in &timeline.tracks {
        for clip in &track.clips {
            let source = library.get(&clip.video_clip_id).ok_or_else(|| {
                ExportError::Validation(format!(
                    "clip {} on track {} references unknown media {}",
                    clip.id, track.id, clip.video_clip_id
                ))
            })?;

            File::open(&source.path).map_err(|e| {
                ExportError::Validation(format!(
                    "source file {:?} for clip {} on track {} is not readable: {}",
                    source.path, clip.id, track.id, e
                ))
            })?;

            if clip.trim_start < 0.0 {
                return Err(ExportError::Validation(format!(
                    "clip {} on track {} has negative trim start {}",
                    clip.id, track.id, clip.trim_start
                )));
            }

            if clip.trim_end <= clip.trim_start {
                return Err(ExportError::Validation(format!(
                    "clip {} on track {} has empty trim window [{}, {})",
                    clip.id, track.id, clip.trim_start, clip.trim_end
                )));
            }

            if clip.trim_end > source.duration {
                return Err(ExportError::Validation(format!(
                    "clip {} on track {} trims past the end of its source ({} > {})",
                    clip.id, track.id, clip.trim_end, source.duration
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{TimelineClip, Track};
    use std::io::Write;
    use std::path::PathBuf;

    fn readable_source(duration: f64) -> (tempfile::NamedTempFile, VideoClip) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"stub").unwrap();
        let clip = VideoClip::new(file.path().to_path_buf(), duration, 1920, 1080, 30.0);
        (file, clip)
    }

    fn timeline_with(source: &VideoClip, clip: TimelineClip) -> Timeline {
        let mut track = Track::video();
        track.clips.push(clip);
        let _ = source;
        Timeline::new(vec![track])
    }

    fn library_of(clips: &[&VideoClip]) -> HashMap<String, VideoClip> {
        clips
            .iter()
            .map(|c| (c.id.clone(), (*c).clone()))
            .collect()
    }

    #[test]
    fn accepts_well_formed_timeline() {
        let (_file, source) = readable_source(10.0);
        let timeline = timeline_with(&source, TimelineClip::place(&source, 0.0));
        assert!(validate_timeline(&timeline, &library_of(&[&source])).is_ok());
    }

    #[test]
    fn rejects_empty_track_list() {
        let timeline = Timeline::new(vec![]);
        let err = validate_timeline(&timeline, &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("no video tracks"));
    }

    #[test]
    fn rejects_timeline_without_clips() {
        let timeline = Timeline::new(vec![Track::video(), Track::video()]);
        let err = validate_timeline(&timeline, &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("no clips"));
    }

    #[test]
    fn rejects_unknown_clip_reference() {
        let (_file, source) = readable_source(10.0);
        let mut clip = TimelineClip::place(&source, 0.0);
        clip.video_clip_id = "missing".to_string();
        let timeline = timeline_with(&source, clip);

        let err = validate_timeline(&timeline, &library_of(&[&source])).unwrap_err();
        assert!(err.to_string().contains("unknown media"));
    }

    #[test]
    fn rejects_unreadable_source_file() {
        let source = VideoClip::new(
            PathBuf::from("/nonexistent/path/clip.mp4"),
            10.0,
            1920,
            1080,
            30.0,
        );
        let timeline = timeline_with(&source, TimelineClip::place(&source, 0.0));

        let err = validate_timeline(&timeline, &library_of(&[&source])).unwrap_err();
        assert!(err.to_string().contains("not readable"));
    }

    #[test]
    fn rejects_negative_trim_start() {
        let (_file, source) = readable_source(10.0);
        let clip = TimelineClip {
            trim_start: -1.0,
            ..TimelineClip::place(&source, 0.0)
        };
        let timeline = timeline_with(&source, clip);

        let err = validate_timeline(&timeline, &library_of(&[&source])).unwrap_err();
        assert!(err.to_string().contains("negative trim start"));
    }

    #[test]
    fn rejects_inverted_trim_window() {
        let (_file, source) = readable_source(10.0);
        let clip = TimelineClip {
            trim_start: 5.0,
            trim_end: 5.0,
            ..TimelineClip::place(&source, 0.0)
        };
        let timeline = timeline_with(&source, clip);

        let err = validate_timeline(&timeline, &library_of(&[&source])).unwrap_err();
        assert!(err.to_string().contains("empty trim window"));
    }

    #[test]
    fn rejects_trim_past_source_end() {
        let (_file, source) = readable_source(10.0);
        let clip = TimelineClip {
            trim_end: 12.0,
            ..TimelineClip::place(&source, 0.0)
        };
        let timeline = timeline_with(&source, clip);

        let err = validate_timeline(&timeline, &library_of(&[&source])).unwrap_err();
        assert!(err.to_string().contains("trims past the end"));
    }

    #[test]
    fn error_names_the_offending_clip_and_track() {
        let (_file, source) = readable_source(10.0);
        let clip = TimelineClip {
            trim_end: 20.0,
            ..TimelineClip::place(&source, 0.0)
        };
        let clip_id = clip.id.clone();
        let timeline = timeline_with(&source, clip);
        let track_id = timeline.tracks[0].id.clone();

        let err = validate_timeline(&timeline, &library_of(&[&source])).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(&clip_id));
        assert!(message.contains(&track_id));
    }
}

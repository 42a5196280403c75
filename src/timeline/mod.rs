//! Timeline data model shared with the editor.

pub mod schema;

pub use schema::{OverlayPosition, Timeline, TimelineClip, Track, TrackKind, VideoClip};

//! Trackcut - multi-track timeline composition and export engine.
//!
//! Renders a multi-track, multi-clip editing timeline into a single output
//! media file: the timeline is validated, translated into a strictly
//! time-ordered sequence of independently renderable segments, each segment
//! is rendered through an external transcoding engine, and the results are
//! reassembled with a lossless stream copy.
//!
//! The editor application hands in a [`timeline::Timeline`], the resolved
//! [`timeline::VideoClip`] library, [`export::ExportSettings`] and a
//! destination path:
//!
//! ```no_run
//! use trackcut::export::{ExportPipeline, ExportSettings, FfmpegEngine};
//! use trackcut::timeline::{Timeline, Track, TimelineClip, VideoClip};
//!
//! # async fn demo() -> Result<(), trackcut::export::ExportError> {
//! let source = VideoClip::new("screen.mp4".into(), 42.0, 1920, 1080, 30.0);
//! let mut track = Track::video();
//! track.clips.push(TimelineClip::place(&source, 0.0));
//! let timeline = Timeline::new(vec![track]);
//!
//! let settings = ExportSettings {
//!     output_path: "final.mp4".into(),
//!     ..ExportSettings::default()
//! };
//! let pipeline = ExportPipeline::new(FfmpegEngine::new(), timeline, vec![source], settings);
//! let handle = pipeline.handle();
//! let report = pipeline.run(|p| println!("{:5.1}% {}", p.percent, p.message)).await?;
//! # let _ = (handle, report);
//! # Ok(())
//! # }
//! ```
//!
//! Rendering is strictly sequential - one encoder subprocess at a time - and
//! cancellation plus temp-file cleanup are guaranteed on every exit path.

pub mod export;
pub mod logging;
pub mod timeline;

pub use export::{
    ExportError, ExportHandle, ExportPipeline, ExportProgress, ExportReport, ExportSettings,
};
pub use timeline::{Timeline, TimelineClip, Track, VideoClip};

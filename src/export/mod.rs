//! Timeline export module
//!
//! This module turns a multi-track timeline into a single output media file:
//! validation, segment planning, per-segment rendering through an external
//! transcoding engine, and lossless reassembly.

pub mod concat;
pub mod engine;
pub mod ffmpeg;
pub mod pipeline;
pub mod plan;
pub mod render;
pub mod types;
pub mod validate;

pub use engine::{CancelToken, MediaInfo, TranscodeEngine, TranscodeJob};
pub use ffmpeg::FfmpegEngine;
pub use pipeline::{cancel, ExportHandle, ExportPipeline, ExportState};
pub use plan::{plan_segments, Segment};
pub use types::{
    ExportError, ExportFormat, ExportProgress, ExportQuality, ExportReport, ExportSettings,
    ExportStage,
};
pub use validate::validate_timeline;

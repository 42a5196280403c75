//! Export types and configuration
//!
//! This module defines the types used for export configuration,
//! progress tracking, and error handling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Export container format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Mp4,
    Webm,
    Mov,
}

impl ExportFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "mp4",
            ExportFormat::Webm => "webm",
            ExportFormat::Mov => "mov",
        }
    }

    /// Get the FFmpeg video codec for this format
    pub fn video_codec(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 | ExportFormat::Mov => "libx264",
            ExportFormat::Webm => "libvpx-vp9",
        }
    }

    /// Get the FFmpeg audio codec for this format
    pub fn audio_codec(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 | ExportFormat::Mov => "aac",
            ExportFormat::Webm => "libopus",
        }
    }
}

/// Export quality levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportQuality {
    Low,
    Medium,
    High,
    Lossless,
}

impl ExportQuality {
    /// Get the CRF value for H.264/VP9 encoding
    /// Lower values = higher quality, larger files
    pub fn crf(&self) -> u8 {
        match self {
            ExportQuality::Low => 28,
            ExportQuality::Medium => 23,
            ExportQuality::High => 18,
            // CRF 1 is "visually lossless" - true lossless (CRF 0) has
            // compatibility issues with scaling and yuv420p
            ExportQuality::Lossless => 1,
        }
    }

    /// Get the FFmpeg preset for H.264 encoding
    pub fn h264_preset(&self) -> &'static str {
        match self {
            ExportQuality::Low => "faster",
            ExportQuality::Medium => "medium",
            ExportQuality::High => "slow",
            ExportQuality::Lossless => "veryslow",
        }
    }
}

/// Export configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSettings {
    /// Output container format
    pub format: ExportFormat,
    /// Quality level
    pub quality: ExportQuality,
    /// Output width in pixels (None = use source resolution)
    pub width: Option<u32>,
    /// Output height in pixels (None = use source resolution)
    pub height: Option<u32>,
    /// Output frame rate (None = 30)
    pub fps: Option<u32>,
    /// Video bitrate (e.g. "8M"; None = CRF-only rate control)
    pub video_bitrate: Option<String>,
    /// Audio bitrate (e.g. "192k")
    pub audio_bitrate: Option<String>,
    /// Output file path
    pub output_path: PathBuf,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::Mp4,
            quality: ExportQuality::Medium,
            width: None,
            height: None,
            fps: None,
            video_bitrate: None,
            audio_bitrate: Some("192k".to_string()),
            output_path: PathBuf::from("output.mp4"),
        }
    }
}

/// Export progress stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ExportStage {
    /// Checking clip references and trim bounds
    Validating,
    /// Building the segment plan
    Planning,
    /// Rendering one segment of the plan
    Rendering { segment: usize, total: usize },
    /// Concatenating rendered segments
    Assembling,
    /// Export completed successfully
    Complete,
    /// Export failed with error
    Error { message: String },
}

/// Export progress information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportProgress {
    /// Progress percentage (0.0 to 100.0)
    pub percent: f32,
    /// Current stage of export
    pub stage: ExportStage,
    /// Human-readable status line
    pub message: String,
}

// Percent spans per stage; rendering owns the bulk of the bar.
const RENDER_SPAN_START: f32 = 5.0;
const RENDER_SPAN_END: f32 = 95.0;

impl ExportProgress {
    pub fn validating() -> Self {
        Self {
            percent: 0.0,
            stage: ExportStage::Validating,
            message: "Validating timeline".to_string(),
        }
    }

    pub fn planning() -> Self {
        Self {
            percent: 3.0,
            stage: ExportStage::Planning,
            message: "Planning segments".to_string(),
        }
    }

    /// Progress inside the rendering span. `fraction` is the completed part
    /// of the current segment (0.0 - 1.0) from the encoder's self-reported
    /// elapsed time.
    pub fn rendering(segment: usize, total: usize, fraction: f64) -> Self {
        let total = total.max(1);
        let done = (segment as f64 + fraction.clamp(0.0, 1.0)) / total as f64;
        let percent = RENDER_SPAN_START + done as f32 * (RENDER_SPAN_END - RENDER_SPAN_START);
        Self {
            percent,
            stage: ExportStage::Rendering { segment, total },
            message: format!("Rendering segment {} of {}", segment + 1, total),
        }
    }

    pub fn assembling() -> Self {
        Self {
            percent: RENDER_SPAN_END,
            stage: ExportStage::Assembling,
            message: "Assembling output".to_string(),
        }
    }

    pub fn complete() -> Self {
        Self {
            percent: 100.0,
            stage: ExportStage::Complete,
            message: "Export complete".to_string(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            percent: 0.0,
            stage: ExportStage::Error {
                message: message.clone(),
            },
            message,
        }
    }
}

/// Summary of a completed export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    /// Path of the produced file
    pub output_path: PathBuf,
    /// Composition duration in seconds
    pub duration: f64,
    /// Output file size in bytes
    pub file_size: u64,
    /// Number of segments rendered (1 for the single-clip fast path)
    pub segment_count: usize,
    /// When the export started
    pub started_at: DateTime<Utc>,
    /// When the export finished
    pub finished_at: DateTime<Utc>,
}

impl ExportReport {
    /// Wall-clock encode time in seconds
    pub fn encode_time(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    /// Bad clip reference, bad trim bounds, or missing/unreadable source.
    /// Never retried.
    #[error("invalid timeline: {0}")]
    Validation(String),

    /// The encoder binary could not be launched at all
    #[error("failed to launch encoder (is ffmpeg installed and on PATH?): {0}")]
    Spawn(String),

    /// The encoder ran but exited non-zero
    #[error("encoder exited with error: {0}")]
    Process(String),

    /// Concatenation of rendered segments failed
    #[error("assembly failed: {0}")]
    Assembly(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export cancelled")]
    Cancelled,
}

impl From<ExportError> for String {
    fn from(e: ExportError) -> String {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_maps_to_crf_and_preset() {
        assert_eq!(ExportQuality::Medium.crf(), 23);
        assert_eq!(ExportQuality::High.h264_preset(), "slow");
        assert!(ExportQuality::Lossless.crf() < ExportQuality::High.crf());
    }

    #[test]
    fn format_codecs_match_container() {
        assert_eq!(ExportFormat::Mp4.video_codec(), "libx264");
        assert_eq!(ExportFormat::Webm.audio_codec(), "libopus");
        assert_eq!(ExportFormat::Mov.extension(), "mov");
    }

    #[test]
    fn rendering_progress_spans_stage_boundaries() {
        let first = ExportProgress::rendering(0, 4, 0.0);
        let last = ExportProgress::rendering(3, 4, 1.0);
        assert_eq!(first.percent, 5.0);
        assert_eq!(last.percent, 95.0);
        assert!(ExportProgress::rendering(1, 4, 0.5).percent > first.percent);
    }

    #[test]
    fn rendering_progress_fraction_is_clamped() {
        let over = ExportProgress::rendering(0, 2, 7.5);
        assert!(over.percent <= 50.0);
    }
}

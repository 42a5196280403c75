//! FFmpeg-backed transcoding engine
//!
//! Wraps the `ffmpeg`/`ffprobe` command line tools behind the
//! [`TranscodeEngine`] trait: metadata probing, subprocess execution with
//! concurrent stderr draining, progress parsing, and kill-on-cancel.

use crate::export::engine::{CancelToken, MediaInfo, ProgressSink, TranscodeEngine, TranscodeJob};
use crate::export::types::ExportError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};

/// Production [`TranscodeEngine`] backed by the ffmpeg command line tools.
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegEngine {
    /// Use `ffmpeg`/`ffprobe` from PATH
    pub fn new() -> Self {
        Self::with_paths("ffmpeg", "ffprobe")
    }

    /// Use explicit binary locations
    pub fn with_paths(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg.into(),
            ffprobe_path: ffprobe.into(),
        }
    }

    async fn run_ffprobe(&self, args: &[&str]) -> Result<String, ExportError> {
        let output = Command::new(&self.ffprobe_path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExportError::Spawn(format!("ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::Process(format!(
                "ffprobe failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn kill_and_reap(child: &mut Child) {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ExportError> {
        let path_str = path.to_string_lossy();

        // Video stream metadata plus container duration, one line each.
        let stdout = self
            .run_ffprobe(&[
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=codec_name,width,height,r_frame_rate",
                "-show_entries",
                "format=duration",
                "-of",
                "csv=p=0",
                &path_str,
            ])
            .await?;

        let mut lines = stdout.lines().filter(|l| !l.trim().is_empty());
        let stream_line = lines.next().ok_or_else(|| {
            ExportError::Process(format!("no video stream found in {:?}", path))
        })?;
        let duration_line = lines.next().unwrap_or("0");

        let (codec, width, height, fps) = parse_stream_line(stream_line)
            .ok_or_else(|| {
                ExportError::Process(format!("unexpected ffprobe output: {}", stream_line))
            })?;
        let duration: f64 = duration_line.trim().parse().unwrap_or(0.0);

        // A second, cheap query for audio-stream presence.
        let audio_out = self
            .run_ffprobe(&[
                "-v",
                "error",
                "-select_streams",
                "a",
                "-show_entries",
                "stream=index",
                "-of",
                "csv=p=0",
                &path_str,
            ])
            .await?;
        let has_audio = !audio_out.trim().is_empty();

        let info = MediaInfo {
            duration,
            width,
            height,
            fps,
            has_audio,
            codec,
        };
        tracing::debug!("Probed {:?}: {:?}", path, info);
        Ok(info)
    }

    async fn run(
        &self,
        job: TranscodeJob,
        token: &CancelToken,
        on_progress: ProgressSink<'_>,
    ) -> Result<(), ExportError> {
        token.check()?;

        tracing::info!("Starting ffmpeg: {:?}", job.args);

        let mut child = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .arg("-nostdin")
            .arg("-progress")
            .arg("pipe:1")
            .args(&job.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExportError::Spawn(format!("ffmpeg: {}", e)))?;

        // Drain stderr concurrently so a chatty encoder cannot fill the pipe
        // buffer and deadlock against our stdout reads.
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut stderr = stderr;
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).to_string()
            })
        });

        // Progress lines arrive on stdout until the process exits.
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    next = lines.next_line() => match next {
                        Ok(Some(line)) => {
                            if let (Some(secs), Some(cb)) =
                                (parse_progress_line(&line), on_progress)
                            {
                                cb(secs);
                            }
                        }
                        _ => break,
                    },
                    _ = token.cancelled() => {
                        tracing::info!("Terminating ffmpeg (cancelled)");
                        Self::kill_and_reap(&mut child).await;
                        return Err(ExportError::Cancelled);
                    }
                }
            }
        }

        let status = tokio::select! {
            status = child.wait() => status
                .map_err(|e| ExportError::Process(format!("failed to wait for ffmpeg: {}", e)))?,
            _ = token.cancelled() => {
                Self::kill_and_reap(&mut child).await;
                return Err(ExportError::Cancelled);
            }
        };

        if !status.success() {
            let stderr = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            tracing::error!("ffmpeg exited with {}: {}", status, stderr.trim());
            return Err(ExportError::Process(stderr.trim().to_string()));
        }

        Ok(())
    }
}

/// Parse the ffprobe stream csv line: `codec,width,height,num/den`
fn parse_stream_line(line: &str) -> Option<(String, u32, u32, f64)> {
    let parts: Vec<&str> = line.trim().split(',').collect();
    if parts.len() < 4 {
        return None;
    }
    let codec = parts[0].to_string();
    let width: u32 = parts[1].parse().ok()?;
    let height: u32 = parts[2].parse().ok()?;
    let fps = parse_frame_rate(parts[3]);
    Some((codec, width, height, fps))
}

/// Parse an ffprobe frame rate (format: "30/1" or "30000/1001")
fn parse_frame_rate(raw: &str) -> f64 {
    let parts: Vec<&str> = raw.trim().split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().unwrap_or(30.0);
        let den: f64 = parts[1].parse().unwrap_or(1.0);
        if den > 0.0 {
            num / den
        } else {
            30.0
        }
    } else {
        raw.trim().parse().unwrap_or(30.0)
    }
}

/// Extract elapsed output time in seconds from a `-progress pipe:1` line.
///
/// ffmpeg reports `out_time_us`/`out_time_ms`, both in microseconds despite
/// the latter's name.
fn parse_progress_line(line: &str) -> Option<f64> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => {
            let micros: i64 = value.trim().parse().ok()?;
            Some(micros.max(0) as f64 / 1_000_000.0)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_parses_rational_and_plain() {
        assert_eq!(parse_frame_rate("30/1"), 30.0);
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), 25.0);
        assert_eq!(parse_frame_rate("24/0"), 30.0);
    }

    #[test]
    fn stream_line_parses_codec_and_dimensions() {
        let (codec, w, h, fps) = parse_stream_line("h264,1920,1080,30/1").unwrap();
        assert_eq!(codec, "h264");
        assert_eq!((w, h), (1920, 1080));
        assert_eq!(fps, 30.0);

        assert!(parse_stream_line("h264,1920").is_none());
    }

    #[test]
    fn progress_line_reports_microseconds_as_seconds() {
        assert_eq!(parse_progress_line("out_time_us=2500000"), Some(2.5));
        assert_eq!(parse_progress_line("out_time_ms=2500000"), Some(2.5));
        assert_eq!(parse_progress_line("frame=42"), None);
        assert_eq!(parse_progress_line("progress=continue"), None);
    }

    #[test]
    fn negative_progress_clamps_to_zero() {
        // ffmpeg emits out_time_us=-9223372036854775808 before the first frame
        assert_eq!(parse_progress_line("out_time_us=-125000"), Some(0.0));
    }
}

//! Export pipeline orchestration
//!
//! Coordinates the full export: validation, segment planning, sequential
//! per-segment rendering, and final assembly. Reports monotonically
//! non-decreasing progress and guarantees temp-file cleanup on every exit
//! path - success, failure, or cancellation.

use crate::export::concat;
use crate::export::engine::{CancelToken, MediaInfo, TranscodeEngine};
use crate::export::plan::{plan_segments, TIME_EPSILON};
use crate::export::render::{RenderSpec, SegmentRenderer};
use crate::export::types::{ExportError, ExportProgress, ExportReport, ExportSettings};
use crate::export::validate::validate_timeline;
use crate::timeline::{Timeline, TimelineClip, VideoClip};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Orchestrator states. `Failed` is terminal and reachable from every
/// non-`Done` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Validating,
    Planning,
    RenderingSegment(usize),
    Assembling,
    Done,
    Failed,
}

/// Handle to a running export: observe its state, request cancellation.
///
/// Cancellation signals the shared token; the engine terminates the in-flight
/// subprocess and the pipeline unwinds through cleanup before resolving with
/// [`ExportError::Cancelled`].
#[derive(Clone)]
pub struct ExportHandle {
    token: CancelToken,
    state: Arc<Mutex<ExportState>>,
}

impl ExportHandle {
    fn new() -> Self {
        Self {
            token: CancelToken::new(),
            state: Arc::new(Mutex::new(ExportState::Idle)),
        }
    }

    /// Request cancellation of the export. Idempotent.
    pub fn cancel(&self) {
        tracing::info!("Export cancellation requested");
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Current orchestrator state
    pub fn state(&self) -> ExportState {
        *self.state.lock()
    }

    fn set_state(&self, state: ExportState) {
        *self.state.lock() = state;
    }
}

/// Cancel a running export through its handle.
pub fn cancel(handle: &ExportHandle) {
    handle.cancel();
}

/// Fast paths that skip planning and per-segment rendering entirely.
enum FastPath {
    /// One base-track clip starting at zero: direct single-pass render
    SingleClip(TimelineClip),
    /// One base track of contiguous clips: per-clip render + concatenate
    SingleTrack(Vec<TimelineClip>),
}

/// The export engine's public entry point.
///
/// Owns the timeline, library and settings for the duration of one export.
pub struct ExportPipeline<E> {
    engine: E,
    timeline: Timeline,
    library: HashMap<String, VideoClip>,
    settings: ExportSettings,
    handle: ExportHandle,
}

impl<E: TranscodeEngine> ExportPipeline<E> {
    pub fn new(
        engine: E,
        timeline: Timeline,
        clips: Vec<VideoClip>,
        settings: ExportSettings,
    ) -> Self {
        let library = clips.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self {
            engine,
            timeline,
            library,
            settings,
            handle: ExportHandle::new(),
        }
    }

    /// Handle for observing and cancelling this export
    pub fn handle(&self) -> ExportHandle {
        self.handle.clone()
    }

    /// Run the export to completion.
    ///
    /// `progress` is invoked zero or more times with non-decreasing percents;
    /// it is the only externally observable intermediate state.
    pub async fn run<F>(self, progress: F) -> Result<ExportReport, ExportError>
    where
        F: Fn(ExportProgress) + Send + Sync,
    {
        let started_at = Utc::now();
        let reporter = ProgressReporter::new(progress);

        let result = self.run_inner(&reporter, started_at).await;
        match result {
            Ok(report) => {
                self.handle.set_state(ExportState::Done);
                reporter.report(ExportProgress::complete());
                tracing::info!(
                    "Export complete: {:?} ({} segments, {:.1}s encode time)",
                    report.output_path,
                    report.segment_count,
                    report.encode_time()
                );
                Ok(report)
            }
            Err(e) => {
                self.handle.set_state(ExportState::Failed);
                // Partially rendered output is never surfaced as a result.
                if self.settings.output_path.exists() {
                    if let Err(remove_err) = std::fs::remove_file(&self.settings.output_path) {
                        tracing::warn!(
                            "Failed to remove partial output {:?}: {}",
                            self.settings.output_path,
                            remove_err
                        );
                    }
                }
                tracing::error!("Export failed: {}", e);
                reporter.report(ExportProgress::error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_inner<F>(
        &self,
        reporter: &ProgressReporter<F>,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<ExportReport, ExportError>
    where
        F: Fn(ExportProgress) + Send + Sync,
    {
        let token = self.handle.token.clone();

        // Validation runs before any subprocess or temp file exists.
        self.handle.set_state(ExportState::Validating);
        reporter.report(ExportProgress::validating());
        validate_timeline(&self.timeline, &self.library)?;
        token.check()?;

        let duration = self.timeline.composition_duration();
        if duration <= TIME_EPSILON {
            return Err(ExportError::Validation(
                "composition is empty: the base track has no clips".to_string(),
            ));
        }

        let spec = self.resolve_spec().await?;
        let mut renderer =
            SegmentRenderer::new(&self.engine, &self.timeline.tracks, &self.library, spec);

        let destination = self.settings.output_path.clone();
        let segment_count = match detect_fast_path(&self.timeline) {
            Some(FastPath::SingleClip(clip)) => {
                tracing::info!("Fast path: single clip, direct render");
                self.handle.set_state(ExportState::RenderingSegment(0));
                let clip_duration = clip.trim_end - clip.trim_start;
                let start = clip.start_time;
                let on_progress = |elapsed: f64| {
                    reporter.report(ExportProgress::rendering(
                        0,
                        1,
                        fraction_of(elapsed, clip_duration),
                    ));
                };
                renderer
                    .render_clip(
                        0,
                        clip,
                        start,
                        start + clip_duration,
                        &destination,
                        &token,
                        Some(&on_progress),
                    )
                    .await?;
                1
            }
            Some(FastPath::SingleTrack(clips)) => {
                tracing::info!(
                    "Fast path: {} base-track clips, per-clip render + concat",
                    clips.len()
                );
                let work_dir = self.create_work_dir()?;
                let total = clips.len();
                let mut rendered = Vec::with_capacity(total);

                for (index, clip) in clips.into_iter().enumerate() {
                    self.handle.set_state(ExportState::RenderingSegment(index));
                    token.check()?;
                    reporter.report(ExportProgress::rendering(index, total, 0.0));

                    let out = segment_path(work_dir.path(), index, renderer.spec().extension);
                    let clip_duration = clip.trim_end - clip.trim_start;
                    let start = clip.start_time;
                    let on_progress = |elapsed: f64| {
                        reporter.report(ExportProgress::rendering(
                            index,
                            total,
                            fraction_of(elapsed, clip_duration),
                        ));
                    };
                    renderer
                        .render_clip(
                            0,
                            clip,
                            start,
                            start + clip_duration,
                            &out,
                            &token,
                            Some(&on_progress),
                        )
                        .await?;
                    rendered.push(out);
                }

                self.handle.set_state(ExportState::Assembling);
                reporter.report(ExportProgress::assembling());
                concat::assemble(
                    &self.engine,
                    &rendered,
                    work_dir.path(),
                    &destination,
                    &token,
                    None,
                )
                .await?;
                total
            }
            None => {
                self.handle.set_state(ExportState::Planning);
                reporter.report(ExportProgress::planning());
                let segments = plan_segments(&self.timeline.tracks, duration);
                tracing::info!(
                    "Planned {} segments over {:.3}s",
                    segments.len(),
                    duration
                );

                let work_dir = self.create_work_dir()?;
                let total = segments.len();
                let mut rendered = Vec::with_capacity(total);

                for (index, segment) in segments.iter().enumerate() {
                    self.handle.set_state(ExportState::RenderingSegment(index));
                    token.check()?;
                    reporter.report(ExportProgress::rendering(index, total, 0.0));

                    let out = segment_path(work_dir.path(), index, renderer.spec().extension);
                    let segment_duration = segment.duration();
                    let on_progress = |elapsed: f64| {
                        reporter.report(ExportProgress::rendering(
                            index,
                            total,
                            fraction_of(elapsed, segment_duration),
                        ));
                    };
                    renderer
                        .render_segment(segment, &out, &token, Some(&on_progress))
                        .await?;
                    rendered.push(out);
                }

                self.handle.set_state(ExportState::Assembling);
                reporter.report(ExportProgress::assembling());
                concat::assemble(
                    &self.engine,
                    &rendered,
                    work_dir.path(),
                    &destination,
                    &token,
                    None,
                )
                .await?;
                total
            }
        };

        let file_size = std::fs::metadata(&destination).map(|m| m.len()).unwrap_or(0);
        Ok(ExportReport {
            output_path: destination,
            duration,
            file_size,
            segment_count,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Resolve encoding parameters, probing the first base source when the
    /// settings ask for "use source resolution".
    async fn resolve_spec(&self) -> Result<RenderSpec, ExportError> {
        if self.settings.width.is_some() && self.settings.height.is_some() {
            return Ok(RenderSpec::resolve(&self.settings, None));
        }

        let base_source = self
            .timeline
            .base_track()
            .and_then(|track| track.clips.first())
            .and_then(|clip| self.library.get(&clip.video_clip_id));

        let probed = match base_source {
            Some(source) => match self.engine.probe(&source.path).await {
                Ok(info) => Some(info),
                Err(e) => {
                    // The library's recorded dimensions are good enough when
                    // the prober has trouble with the container.
                    tracing::warn!(
                        "Probe of {:?} failed ({}); using library metadata",
                        source.path,
                        e
                    );
                    Some(MediaInfo {
                        duration: source.duration,
                        width: source.width,
                        height: source.height,
                        fps: source.fps,
                        has_audio: false,
                        codec: String::new(),
                    })
                }
            },
            None => None,
        };

        Ok(RenderSpec::resolve(&self.settings, probed.as_ref()))
    }

    /// Per-export scratch directory; dropped (and deleted) on every exit path.
    fn create_work_dir(&self) -> Result<tempfile::TempDir, ExportError> {
        let dir = tempfile::Builder::new()
            .prefix("trackcut-export-")
            .tempdir()?;
        tracing::debug!("Created export work dir {:?}", dir.path());
        Ok(dir)
    }
}

impl<E: TranscodeEngine + 'static> ExportPipeline<E> {
    /// Start the export on a background task.
    ///
    /// Returns the handle for cancellation plus the join handle resolving to
    /// the export result.
    pub fn start<F>(self, progress: F) -> (ExportHandle, JoinHandle<Result<ExportReport, ExportError>>)
    where
        F: Fn(ExportProgress) + Send + Sync + 'static,
    {
        let handle = self.handle();
        let task = tokio::spawn(self.run(progress));
        (handle, task)
    }
}

fn segment_path(dir: &std::path::Path, index: usize, extension: &str) -> PathBuf {
    dir.join(format!("seg-{:03}.{}", index, extension))
}

fn fraction_of(elapsed: f64, duration: f64) -> f64 {
    if duration > 0.0 {
        elapsed / duration
    } else {
        1.0
    }
}

/// Detect timelines that need no cross-track composition: only the base
/// track holds clips, and they tile the composition from zero without gaps.
/// Anything else goes through the full planner.
fn detect_fast_path(timeline: &Timeline) -> Option<FastPath> {
    let mut populated = timeline
        .tracks
        .iter()
        .enumerate()
        .filter(|(_, track)| track.has_clips());
    let (index, track) = populated.next()?;
    if index != 0 || populated.next().is_some() {
        return None;
    }

    if track.clips[0].start_time > TIME_EPSILON {
        return None;
    }
    for pair in track.clips.windows(2) {
        if (pair[1].start_time - pair[0].end_time).abs() > TIME_EPSILON {
            return None;
        }
    }

    if track.clips.len() == 1 {
        Some(FastPath::SingleClip(track.clips[0].clone()))
    } else {
        Some(FastPath::SingleTrack(track.clips.clone()))
    }
}

/// Applies the monotonic progress guarantee: a late-arriving lower percent is
/// clamped to the highest value reported so far.
struct ProgressReporter<F> {
    callback: F,
    last_percent: Mutex<f32>,
}

impl<F: Fn(ExportProgress)> ProgressReporter<F> {
    fn new(callback: F) -> Self {
        Self {
            callback,
            last_percent: Mutex::new(0.0),
        }
    }

    fn report(&self, mut progress: ExportProgress) {
        {
            let mut last = self.last_percent.lock();
            if progress.percent < *last {
                progress.percent = *last;
            } else {
                *last = progress.percent;
            }
        }
        (self.callback)(progress);
    }
}

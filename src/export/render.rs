//! Segment rendering
//!
//! Renders one segment of the plan to an intermediate file, choosing among
//! gap fill, direct single-clip extraction, and multi-track compositing.
//! Composites run an audio-availability-driven fallback chain with escalating
//! retry strategies.
//!
//! Every strategy emits exactly one file per segment at identical
//! resolution/fps/pixel-format/codec so the assembler can concatenate with a
//! lossless stream copy.

use crate::export::engine::{CancelToken, MediaInfo, ProgressSink, TranscodeEngine, TranscodeJob};
use crate::export::plan::Segment;
use crate::export::types::{ExportError, ExportSettings};
use crate::timeline::{OverlayPosition, TimelineClip, Track, VideoClip};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Audio sample rate used for every intermediate and synthesized stream
const AUDIO_RATE: u32 = 48_000;

/// Default frame rate when the settings leave it unspecified
const DEFAULT_FPS: u32 = 30;

// =============================================================================
// Render Spec
// =============================================================================

/// Settings-derived encoding parameters shared by every intermediate.
#[derive(Debug, Clone)]
pub(crate) struct RenderSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: &'static str,
    pub audio_codec: &'static str,
    pub crf: u8,
    pub preset: &'static str,
    pub video_bitrate: Option<String>,
    pub audio_bitrate: String,
    pub extension: &'static str,
}

impl RenderSpec {
    /// Resolve concrete parameters from settings, defaulting resolution from
    /// the probed base source when the settings say "use source".
    pub(crate) fn resolve(settings: &ExportSettings, source: Option<&MediaInfo>) -> Self {
        let width = settings
            .width
            .or(source.map(|info| info.width))
            .unwrap_or(1920);
        let height = settings
            .height
            .or(source.map(|info| info.height))
            .unwrap_or(1080);
        Self {
            // Encoders require even dimensions for yuv420p
            width: round_even(width.max(2)),
            height: round_even(height.max(2)),
            fps: settings.fps.unwrap_or(DEFAULT_FPS).max(1),
            video_codec: settings.format.video_codec(),
            audio_codec: settings.format.audio_codec(),
            crf: settings.quality.crf(),
            preset: settings.quality.h264_preset(),
            video_bitrate: settings.video_bitrate.clone(),
            audio_bitrate: settings
                .audio_bitrate
                .clone()
                .unwrap_or_else(|| "192k".to_string()),
            extension: settings.format.extension(),
        }
    }

    /// Keyframe interval in frames: one forced keyframe every two seconds so
    /// stream-copy concatenation stays frame-accurate.
    fn keyframe_interval(&self) -> u32 {
        self.fps * 2
    }

    /// Encoder arguments shared by every intermediate
    fn codec_args(&self, with_audio: bool) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.video_codec.to_string(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-g".to_string(),
            self.keyframe_interval().to_string(),
            "-sc_threshold".to_string(),
            "0".to_string(),
        ];
        if self.video_codec == "libx264" {
            args.extend(["-preset".to_string(), self.preset.to_string()]);
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }
        if let Some(ref bitrate) = self.video_bitrate {
            args.extend(["-b:v".to_string(), bitrate.clone()]);
        }
        if with_audio {
            args.extend([
                "-c:a".to_string(),
                self.audio_codec.to_string(),
                "-b:a".to_string(),
                self.audio_bitrate.clone(),
                "-ar".to_string(),
                AUDIO_RATE.to_string(),
                "-ac".to_string(),
                "2".to_string(),
            ]);
        }
        args
    }
}

fn round_even(value: u32) -> u32 {
    value & !1
}

fn secs(value: f64) -> String {
    format!("{:.6}", value)
}

fn silence_input(duration: f64) -> [String; 6] {
    [
        "-f".to_string(),
        "lavfi".to_string(),
        "-t".to_string(),
        secs(duration),
        "-i".to_string(),
        format!("anullsrc=r={}:cl=stereo", AUDIO_RATE),
    ]
}

// =============================================================================
// Strategy Selection
// =============================================================================

/// Per-segment rendering strategy, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderStrategy {
    /// No active clips: solid color + silence
    Gap,
    /// Exactly one active clip on exactly one track: direct render
    Single { track_index: usize },
    /// Clips active on two or more tracks
    Composite,
}

pub(crate) fn select_strategy(segment: &Segment) -> RenderStrategy {
    let mut active = segment.active_lanes();
    match (active.next(), active.next()) {
        (None, _) => RenderStrategy::Gap,
        (Some((track_index, _)), None) => RenderStrategy::Single { track_index },
        _ => RenderStrategy::Composite,
    }
}

// =============================================================================
// Audio Fallback Chain
// =============================================================================

/// Audio layout of one composite step, chosen from probed stream presence
/// and track mute flags. First matching variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AudioLayout {
    /// Mix both sides at their volumes, normalized, duration = longest
    BothAudio,
    /// Only the running base carries audio
    BaseOnly,
    /// Only the overlay carries audio
    OverlayOnly,
    /// Neither side: synthesize silence of segment duration
    Silent,
}

impl AudioLayout {
    pub(crate) fn choose(base_has_audio: bool, overlay_has_audio: bool) -> Self {
        match (base_has_audio, overlay_has_audio) {
            (true, true) => AudioLayout::BothAudio,
            (true, false) => AudioLayout::BaseOnly,
            (false, true) => AudioLayout::OverlayOnly,
            (false, false) => AudioLayout::Silent,
        }
    }
}

/// Escalating composite invocation strategies. `Primary` renders the chosen
/// [`AudioLayout`]; each later attempt only runs when the previous one's
/// subprocess exited non-zero. `VideoOnly` must succeed or the export aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompositeAttempt {
    Primary,
    SilenceFallback,
    VideoOnly,
}

pub(crate) const COMPOSITE_ATTEMPTS: [CompositeAttempt; 3] = [
    CompositeAttempt::Primary,
    CompositeAttempt::SilenceFallback,
    CompositeAttempt::VideoOnly,
];

// =============================================================================
// Overlay Geometry
// =============================================================================

/// Pixel placement of an overlay on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OverlayGeometry {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Scale the overlay to `canvas_width * scale`, derive height from the
/// source aspect ratio, and position its top-left corner so the requested
/// center holds, clamped so the overlay never exits canvas bounds.
pub(crate) fn overlay_geometry(
    canvas_width: u32,
    canvas_height: u32,
    source_width: u32,
    source_height: u32,
    position: &OverlayPosition,
) -> OverlayGeometry {
    let width = round_even(
        ((canvas_width as f64 * position.scale) as u32).clamp(2, canvas_width),
    );
    let height = round_even(
        ((width as f64 * source_height as f64 / source_width.max(1) as f64) as u32)
            .clamp(2, canvas_height),
    );

    let x = (position.center_x * canvas_width as f64 - width as f64 / 2.0)
        .clamp(0.0, (canvas_width - width) as f64) as u32;
    let y = (position.center_y * canvas_height as f64 - height as f64 / 2.0)
        .clamp(0.0, (canvas_height - height) as f64) as u32;

    OverlayGeometry {
        width,
        height,
        x,
        y,
    }
}

// =============================================================================
// Argument Builders
// =============================================================================

/// Solid-color video plus silent audio covering a clipless interval.
pub(crate) fn build_gap_args(spec: &RenderSpec, duration: f64, output: &Path) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        "-t".to_string(),
        secs(duration),
        "-i".to_string(),
        format!(
            "color=c=black:s={}x{}:r={}",
            spec.width, spec.height, spec.fps
        ),
    ];
    args.extend(silence_input(duration));
    args.extend([
        "-vf".to_string(),
        "format=yuv420p,setsar=1".to_string(),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
    ]);
    args.extend(spec.codec_args(true));
    args.push(output.to_string_lossy().to_string());
    args
}

/// Extract the segment's window of a source clip at full canvas size:
/// scale to fit preserving aspect ratio, pad with black, constant frame
/// rate, real audio at the track's volume or synthesized silence.
#[allow(clippy::too_many_arguments)]
pub(crate) fn build_extract_args(
    spec: &RenderSpec,
    source: &Path,
    source_offset: f64,
    duration: f64,
    volume: f64,
    has_audio: bool,
    output: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-ss".to_string(),
        secs(source_offset),
        "-t".to_string(),
        secs(duration),
        "-i".to_string(),
        source.to_string_lossy().to_string(),
    ];
    if !has_audio {
        args.extend(silence_input(duration));
    }

    let video_chain = format!(
        "[0:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black,fps={fps},format=yuv420p,setsar=1[vout]",
        w = spec.width,
        h = spec.height,
        fps = spec.fps,
    );
    let filter = if has_audio {
        format!(
            "{video};[0:a]volume={vol},apad,atrim=0:{dur},asetpts=PTS-STARTPTS[aout]",
            video = video_chain,
            vol = volume,
            dur = secs(duration),
        )
    } else {
        video_chain
    };

    args.extend(["-filter_complex".to_string(), filter]);
    args.extend(["-map".to_string(), "[vout]".to_string()]);
    if has_audio {
        args.extend(["-map".to_string(), "[aout]".to_string()]);
    } else {
        args.extend(["-map".to_string(), "1:a".to_string()]);
    }
    args.extend(spec.codec_args(true));
    args.push(output.to_string_lossy().to_string());
    args
}

/// Extract an overlay clip's window at its native resolution with constant
/// frame rate. Volume is applied later by the composite step, so the audio
/// stream (when present) is carried through untouched.
pub(crate) fn build_overlay_extract_args(
    spec: &RenderSpec,
    source: &Path,
    source_offset: f64,
    duration: f64,
    has_audio: bool,
    output: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-ss".to_string(),
        secs(source_offset),
        "-t".to_string(),
        secs(duration),
        "-i".to_string(),
        source.to_string_lossy().to_string(),
        "-vf".to_string(),
        format!("fps={},format=yuv420p,setsar=1", spec.fps),
    ];
    if has_audio {
        args.extend([
            "-af".to_string(),
            format!("apad,atrim=0:{},asetpts=PTS-STARTPTS", secs(duration)),
        ]);
    } else {
        args.push("-an".to_string());
    }
    args.extend(spec.codec_args(has_audio));
    args.push(output.to_string_lossy().to_string());
    args
}

/// One composite invocation: scale and position the overlay onto the running
/// base, mix audio per layout and attempt.
#[allow(clippy::too_many_arguments)]
pub(crate) fn build_composite_args(
    spec: &RenderSpec,
    base: &Path,
    overlay: &Path,
    geometry: OverlayGeometry,
    layout: AudioLayout,
    attempt: CompositeAttempt,
    base_volume: f64,
    overlay_volume: f64,
    duration: f64,
    output: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        base.to_string_lossy().to_string(),
        "-i".to_string(),
        overlay.to_string_lossy().to_string(),
    ];

    let needs_silence = matches!(attempt, CompositeAttempt::SilenceFallback)
        || matches!(attempt, CompositeAttempt::VideoOnly)
        || layout == AudioLayout::Silent;
    if needs_silence {
        args.extend(silence_input(duration));
    }

    let video_chain = format!(
        "[1:v]scale={w}:{h}[ovl];[0:v][ovl]overlay={x}:{y},format=yuv420p[vout]",
        w = geometry.width,
        h = geometry.height,
        x = geometry.x,
        y = geometry.y,
    );

    let audio_chain = match attempt {
        CompositeAttempt::Primary => match layout {
            AudioLayout::BothAudio => Some(format!(
                "[0:a]volume={bv}[ab];[1:a]volume={ov}[ao];\
                 [ab][ao]amix=inputs=2:duration=longest[aout]",
                bv = base_volume,
                ov = overlay_volume,
            )),
            AudioLayout::BaseOnly => Some(format!("[0:a]volume={}[aout]", base_volume)),
            AudioLayout::OverlayOnly => Some(format!("[1:a]volume={}[aout]", overlay_volume)),
            AudioLayout::Silent => None,
        },
        CompositeAttempt::SilenceFallback => {
            // Mix every real stream with an explicit silence source so the
            // invocation cannot fail on a missing or short audio stream.
            let mut labels = Vec::new();
            let mut chains = Vec::new();
            if matches!(layout, AudioLayout::BothAudio | AudioLayout::BaseOnly) {
                chains.push(format!("[0:a]volume={}[ab]", base_volume));
                labels.push("[ab]");
            }
            if matches!(layout, AudioLayout::BothAudio | AudioLayout::OverlayOnly) {
                chains.push(format!("[1:a]volume={}[ao]", overlay_volume));
                labels.push("[ao]");
            }
            labels.push("[2:a]");
            chains.push(format!(
                "{}amix=inputs={}:duration=longest[aout]",
                labels.concat(),
                labels.len(),
            ));
            Some(chains.join(";"))
        }
        CompositeAttempt::VideoOnly => None,
    };

    let filter = match &audio_chain {
        Some(audio) => format!("{};{}", video_chain, audio),
        None => video_chain,
    };

    args.extend(["-filter_complex".to_string(), filter]);
    args.extend(["-map".to_string(), "[vout]".to_string()]);
    if audio_chain.is_some() {
        args.extend(["-map".to_string(), "[aout]".to_string()]);
    } else {
        // Silent layout or video-only fallback: map the synthesized silence.
        args.extend(["-map".to_string(), "2:a".to_string()]);
    }
    args.extend(spec.codec_args(true));
    args.push(output.to_string_lossy().to_string());
    args
}

// =============================================================================
// Segment Renderer
// =============================================================================

/// Renders segments to intermediate files through the transcoding engine.
///
/// Holds the per-export probe cache; rendering is strictly sequential, so the
/// renderer is driven through `&mut self`.
pub(crate) struct SegmentRenderer<'a, E: TranscodeEngine + ?Sized> {
    engine: &'a E,
    tracks: &'a [Track],
    library: &'a HashMap<String, VideoClip>,
    spec: RenderSpec,
    audio_cache: HashMap<PathBuf, bool>,
}

impl<'a, E: TranscodeEngine + ?Sized> SegmentRenderer<'a, E> {
    pub(crate) fn new(
        engine: &'a E,
        tracks: &'a [Track],
        library: &'a HashMap<String, VideoClip>,
        spec: RenderSpec,
    ) -> Self {
        Self {
            engine,
            tracks,
            library,
            spec,
            audio_cache: HashMap::new(),
        }
    }

    pub(crate) fn spec(&self) -> &RenderSpec {
        &self.spec
    }

    fn source_of(&self, clip: &TimelineClip) -> Result<&'a VideoClip, ExportError> {
        self.library.get(&clip.video_clip_id).ok_or_else(|| {
            ExportError::Validation(format!(
                "clip {} references unknown media {}",
                clip.id, clip.video_clip_id
            ))
        })
    }

    /// Probed audio presence for a source file. Probe failures degrade to
    /// "no audio" rather than failing the export.
    async fn source_has_audio(&mut self, path: &Path) -> bool {
        if let Some(&cached) = self.audio_cache.get(path) {
            return cached;
        }
        let has_audio = match self.engine.probe(path).await {
            Ok(info) => info.has_audio,
            Err(e) => {
                tracing::warn!(
                    "Audio probe of {:?} failed ({}); treating as silent",
                    path,
                    e
                );
                false
            }
        };
        self.audio_cache.insert(path.to_path_buf(), has_audio);
        has_audio
    }

    /// Whether a clip contributes audio: probed stream presence gated by the
    /// owning track's mute flag.
    async fn clip_has_audio(&mut self, track: &Track, clip: &TimelineClip) -> bool {
        if track.muted {
            return false;
        }
        let path = self.source_of(clip).map(|s| s.path.clone());
        match path {
            Ok(path) => self.source_has_audio(&path).await,
            Err(_) => false,
        }
    }

    /// Render one segment of the plan to `output`.
    ///
    /// Chain intermediates for composite segments are placed next to the
    /// output file (inside the export temp dir) and cleaned up with it.
    pub(crate) async fn render_segment(
        &mut self,
        segment: &Segment,
        output: &Path,
        token: &CancelToken,
        on_progress: ProgressSink<'_>,
    ) -> Result<(), ExportError> {
        match select_strategy(segment) {
            RenderStrategy::Gap => {
                tracing::debug!(
                    "Segment [{:.3}, {:.3}): gap fill",
                    segment.start_time,
                    segment.end_time
                );
                self.render_gap(segment.duration(), output, token, on_progress)
                    .await
            }
            RenderStrategy::Single { track_index } => {
                let clip = segment.lanes[track_index]
                    .as_ref()
                    .expect("strategy selection found an active lane");
                tracing::debug!(
                    "Segment [{:.3}, {:.3}): single clip {} on track {}",
                    segment.start_time,
                    segment.end_time,
                    clip.id,
                    track_index
                );
                self.render_clip(
                    track_index,
                    clip.clone(),
                    segment.start_time,
                    segment.end_time,
                    output,
                    token,
                    on_progress,
                )
                .await
            }
            RenderStrategy::Composite => {
                tracing::debug!(
                    "Segment [{:.3}, {:.3}): composite of {} lanes",
                    segment.start_time,
                    segment.end_time,
                    segment.active_count()
                );
                self.render_composite(segment, output, token, on_progress)
                    .await
            }
        }
    }

    /// Gap fill: solid color + silence
    async fn render_gap(
        &mut self,
        duration: f64,
        output: &Path,
        token: &CancelToken,
        on_progress: ProgressSink<'_>,
    ) -> Result<(), ExportError> {
        let args = build_gap_args(&self.spec, duration, output);
        self.engine
            .run(TranscodeJob::with_duration(args, duration), token, on_progress)
            .await
    }

    /// Direct render of one clip's window onto the full canvas. Also carries
    /// the orchestrator's fast paths, which bypass segment planning.
    pub(crate) async fn render_clip(
        &mut self,
        track_index: usize,
        clip: TimelineClip,
        start_time: f64,
        end_time: f64,
        output: &Path,
        token: &CancelToken,
        on_progress: ProgressSink<'_>,
    ) -> Result<(), ExportError> {
        let track = &self.tracks[track_index];
        let source = self.source_of(&clip)?;
        let source_path = source.path.clone();

        let offset = clip.trim_start + (start_time - clip.start_time);
        let duration = end_time - start_time;
        let has_audio = self.clip_has_audio(track, &clip).await;

        let args = build_extract_args(
            &self.spec,
            &source_path,
            offset,
            duration,
            track.volume,
            has_audio,
            output,
        );
        self.engine
            .run(TranscodeJob::with_duration(args, duration), token, on_progress)
            .await
    }

    /// Multi-track composite: base first, then each overlay in track order.
    /// The output of compositing overlay `k` becomes the base for `k + 1`.
    async fn render_composite(
        &mut self,
        segment: &Segment,
        output: &Path,
        token: &CancelToken,
        on_progress: ProgressSink<'_>,
    ) -> Result<(), ExportError> {
        let duration = segment.duration();
        let scratch = chain_path(output, "base");

        // Running base: the base-track clip, or synthesized black when the
        // base track is empty for this interval.
        let mut base_has_audio = match segment.lanes[0].as_ref() {
            Some(clip) => {
                let clip = clip.clone();
                let base_track = &self.tracks[0];
                let has_audio = self.clip_has_audio(base_track, &clip).await;
                self.render_clip(
                    0,
                    clip,
                    segment.start_time,
                    segment.end_time,
                    &scratch,
                    token,
                    on_progress,
                )
                .await?;
                has_audio
            }
            None => {
                self.render_gap(duration, &scratch, token, on_progress).await?;
                false
            }
        };
        let mut base_path = scratch;

        let overlays: Vec<(usize, TimelineClip)> = segment
            .active_lanes()
            .filter(|(index, _)| *index > 0)
            .map(|(index, clip)| (index, clip.clone()))
            .collect();
        let last = overlays.len() - 1;

        for (step, (track_index, clip)) in overlays.into_iter().enumerate() {
            token.check()?;

            let track = &self.tracks[track_index];
            let source = self.source_of(&clip)?;
            let geometry = overlay_geometry(
                self.spec.width,
                self.spec.height,
                source.width,
                source.height,
                &track.overlay.unwrap_or_default(),
            );
            let source_path = source.path.clone();

            let overlay_has_audio = self.clip_has_audio(track, &clip).await;
            let overlay_path = chain_path(output, &format!("ovl{}", track_index));
            let offset = clip.trim_start + (segment.start_time - clip.start_time);
            let extract = build_overlay_extract_args(
                &self.spec,
                &source_path,
                offset,
                duration,
                overlay_has_audio,
                &overlay_path,
            );
            self.engine
                .run(
                    TranscodeJob::with_duration(extract, duration),
                    token,
                    on_progress,
                )
                .await?;

            let step_output = if step == last {
                output.to_path_buf()
            } else {
                chain_path(output, &format!("mix{}", track_index))
            };
            let layout = AudioLayout::choose(base_has_audio, overlay_has_audio);

            // The base extract already applied its track volume; the running
            // base side mixes at unit volume from here on.
            let attempt = self
                .composite_with_fallback(
                    &base_path,
                    &overlay_path,
                    geometry,
                    layout,
                    1.0,
                    track.volume,
                    duration,
                    &step_output,
                    token,
                    on_progress,
                )
                .await?;

            // A video-only rescue replaced the audio with silence.
            base_has_audio = match attempt {
                CompositeAttempt::VideoOnly => false,
                _ => base_has_audio || overlay_has_audio,
            };
            base_path = step_output;
        }

        Ok(())
    }

    /// Run one composite step through the escalating attempt table,
    /// returning the attempt that succeeded. `Primary` failures retry with
    /// an explicit silence-source mix, then degrade to video-only; a
    /// `VideoOnly` failure aborts the export.
    #[allow(clippy::too_many_arguments)]
    async fn composite_with_fallback(
        &mut self,
        base: &Path,
        overlay: &Path,
        geometry: OverlayGeometry,
        layout: AudioLayout,
        base_volume: f64,
        overlay_volume: f64,
        duration: f64,
        output: &Path,
        token: &CancelToken,
        on_progress: ProgressSink<'_>,
    ) -> Result<CompositeAttempt, ExportError> {
        let mut last_error = None;

        for attempt in COMPOSITE_ATTEMPTS {
            token.check()?;

            let args = build_composite_args(
                &self.spec,
                base,
                overlay,
                geometry,
                layout,
                attempt,
                base_volume,
                overlay_volume,
                duration,
                output,
            );
            match self
                .engine
                .run(TranscodeJob::with_duration(args, duration), token, on_progress)
                .await
            {
                Ok(()) => return Ok(attempt),
                Err(ExportError::Process(stderr)) => {
                    tracing::warn!(
                        "Composite attempt {:?} failed, escalating: {}",
                        attempt,
                        stderr
                    );
                    last_error = Some(ExportError::Process(stderr));
                }
                // Spawn errors, cancellation and IO problems are not
                // retryable at this level.
                Err(other) => return Err(other),
            }
        }

        Err(last_error.expect("attempt table is non-empty"))
    }
}

/// Sibling path for composite chain intermediates: `seg-003.mp4` ->
/// `seg-003.base.mp4`
fn chain_path(output: &Path, tag: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "segment".to_string());
    let ext = output
        .extension()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "mp4".to_string());
    output.with_file_name(format!("{}.{}.{}", stem, tag, ext))
}

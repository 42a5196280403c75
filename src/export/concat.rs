//! Sequence assembly
//!
//! Concatenates the ordered intermediate segment files into the final output
//! with a lossless stream copy. All intermediates share resolution, frame
//! rate, pixel format and codec, so no re-encoding happens here.

use crate::export::engine::{CancelToken, ProgressSink, TranscodeEngine, TranscodeJob};
use crate::export::types::ExportError;
use std::path::{Path, PathBuf};

/// Write the concat demuxer manifest: one `file '...'` line per segment,
/// in render order.
pub(crate) fn write_manifest(segments: &[PathBuf], manifest: &Path) -> Result<(), ExportError> {
    let mut lines = String::new();
    for path in segments {
        // The concat demuxer quotes with single quotes; escape embedded ones.
        let escaped = path.to_string_lossy().replace('\'', "'\\''");
        lines.push_str(&format!("file '{}'\n", escaped));
    }
    std::fs::write(manifest, lines)?;
    Ok(())
}

/// Stream-copy concatenation arguments for the manifest
pub(crate) fn build_concat_args(manifest: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        manifest.to_string_lossy().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Concatenate the ordered intermediates into `output`.
///
/// Every listed file must exist; a missing intermediate means the render
/// stage and the plan disagree, which is an assembly error, not an IO race
/// worth retrying.
pub(crate) async fn assemble<E: TranscodeEngine + ?Sized>(
    engine: &E,
    segments: &[PathBuf],
    work_dir: &Path,
    output: &Path,
    token: &CancelToken,
    on_progress: ProgressSink<'_>,
) -> Result<(), ExportError> {
    if segments.is_empty() {
        return Err(ExportError::Assembly(
            "no rendered segments to assemble".to_string(),
        ));
    }

    for path in segments {
        if !path.exists() {
            return Err(ExportError::Assembly(format!(
                "missing intermediate file {:?}",
                path
            )));
        }
    }

    // The manifest lives in the export temp dir and is removed with it.
    let manifest = work_dir.join("segments.txt");
    write_manifest(segments, &manifest)?;

    tracing::info!(
        "Assembling {} segments into {:?}",
        segments.len(),
        output
    );

    engine
        .run(
            TranscodeJob::new(build_concat_args(&manifest, output)),
            token,
            on_progress,
        )
        .await
        .map_err(|e| match e {
            // A concat failure after every segment succeeded indicates an
            // inconsistency between expected and actual intermediates.
            ExportError::Process(stderr) => ExportError::Assembly(stderr),
            other => other,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_lists_segments_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("segments.txt");
        let segments = vec![
            dir.path().join("seg-000.mp4"),
            dir.path().join("seg-001.mp4"),
        ];

        write_manifest(&segments, &manifest).unwrap();
        let contents = std::fs::read_to_string(&manifest).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("file '"));
        assert!(lines[0].contains("seg-000.mp4"));
        assert!(lines[1].contains("seg-001.mp4"));
    }

    #[test]
    fn manifest_escapes_single_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("segments.txt");
        let segments = vec![PathBuf::from("/tmp/it's here/seg.mp4")];

        write_manifest(&segments, &manifest).unwrap();
        let contents = std::fs::read_to_string(&manifest).unwrap();
        assert!(contents.contains("it'\\''s here"));
    }

    #[test]
    fn concat_args_request_stream_copy() {
        let args = build_concat_args(Path::new("/tmp/list.txt"), Path::new("/out/final.mp4"));
        let c = args.iter().position(|a| a == "-c").unwrap();
        assert_eq!(args[c + 1], "copy");
        assert_eq!(args.first().unwrap(), "-y");
        assert_eq!(args.last().unwrap(), "/out/final.mp4");
        assert!(args.contains(&"concat".to_string()));
    }
}

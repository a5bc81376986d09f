//! Local dump: segment an MP4 on disk into a directory.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use vidi_common::{Error, Meta, Result};
use vidi_media::{render_mpd, Mp4File, ParseMode, Segmenter};

use crate::storage::{paths, put_bytes, BoxStore, FsStore, StoreSink};

/// Shortest segment duration the dump accepts.
pub const MIN_SEGMENT_DURATION: Duration = Duration::from_secs(1);

/// Segment `input` into `out_dir` and write `manifest.mpd` next to the
/// segments. Durations below one second are raised to one second.
pub async fn segment_file(input: &Path, out_dir: &Path, segment_duration: Duration) -> Result<Meta> {
    let segment_duration = segment_duration.max(MIN_SEGMENT_DURATION);
    let store: Arc<dyn BoxStore> = Arc::new(FsStore::new(out_dir));

    let handle = Handle::current();
    let input = input.to_path_buf();
    let task_store = Arc::clone(&store);
    let meta = tokio::task::spawn_blocking(move || -> Result<Meta> {
        let mut reader = BufReader::new(std::fs::File::open(&input)?);
        let file = Mp4File::parse(&mut reader, ParseMode::Lazy)?;
        let mut sink = StoreSink::new(handle, task_store, "", CancellationToken::new());
        let output = Segmenter::new(segment_duration).segment(&file, Some(&mut reader), &mut sink)?;
        tracing::info!(
            input = %input.display(),
            objects = sink.written().len(),
            "Segmented file"
        );
        Ok(output.meta(segment_duration))
    })
    .await
    .map_err(|e| Error::internal(format!("segmentation task failed: {e}")))??;

    let manifest = render_mpd(&meta, None);
    put_bytes(store.as_ref(), paths::MANIFEST_NAME, manifest.into_bytes()).await?;
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidi_media::fixtures::Mp4Fixture;

    #[tokio::test(flavor = "multi_thread")]
    async fn dumps_segments_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.mp4");
        std::fs::write(&input, Mp4Fixture::default().build()).unwrap();
        let out = dir.path().join("out");

        let meta = segment_file(&input, &out, Duration::from_secs(3)).await.unwrap();

        assert_eq!(meta.tracks.len(), 2);
        for name in ["vide1_init.mp4", "soun1_init.mp4", "vide1_1.m4s", "soun1_4.m4s"] {
            assert!(out.join(name).is_file(), "missing {name}");
        }
        let manifest = std::fs::read_to_string(out.join("manifest.mpd")).unwrap();
        assert!(manifest.contains(r#"codecs="avc1.64001f""#));
        assert!(manifest.contains(r#"codecs="mp4a.40.2""#));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clamps_short_durations() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.mp4");
        std::fs::write(&input, Mp4Fixture::default().build()).unwrap();
        let out = dir.path().join("out");

        let meta = segment_file(&input, &out, Duration::from_millis(100)).await.unwrap();

        let video = meta.video_track().unwrap();
        assert_eq!(video.segment.duration / u64::from(video.segment.timescale), 1);
        assert!(out.join("vide1_10.m4s").is_file());
        assert!(!out.join("vide1_11.m4s").exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_input_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = segment_file(&dir.path().join("nope.mp4"), dir.path(), Duration::from_secs(3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)), "{err}");
    }
}

//! Object names used in the box store.
//!
//! ```text
//! <upload>/<location>/<part>              uploaded parts, 0-based
//! <upload>/<location>/artifact.mp4        legacy single-file upload
//! <watch>/<location>/<track>_init.mp4     init segments
//! <watch>/<location>/<track>_<n>.m4s      media segments, n from 1
//! ```

/// Legacy single-file upload name.
pub const ARTIFACT_NAME: &str = "artifact.mp4";

/// Name of the generated manifest.
pub const MANIFEST_NAME: &str = "manifest.mpd";

/// Join path segments with `/`, dropping empty segments and stray slashes.
pub fn join(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// `<prefix>/<location>`, the directory of one asset.
pub fn asset_dir(prefix: &str, location: &str) -> String {
    join(&[prefix, location])
}

pub fn part_name(prefix: &str, location: &str, num: u32) -> String {
    join(&[prefix, location, &num.to_string()])
}

pub fn artifact_name(prefix: &str, location: &str) -> String {
    join(&[prefix, location, ARTIFACT_NAME])
}

pub fn init_name(track: &str) -> String {
    vidi_media::init_segment_name(track)
}

pub fn media_name(track: &str, seg_num: u32) -> String {
    vidi_media::media_segment_name(track, seg_num)
}

/// Content type an object is served with.
pub fn content_type(name: &str) -> &'static str {
    if name.ends_with(vidi_common::INIT_SUFFIX) {
        "video/mp4"
    } else if name.ends_with(".m4s") {
        "video/iso.segment"
    } else if name.ends_with(".mpd") {
        vidi_media::MPD_CONTENT_TYPE
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_bit_exact() {
        assert_eq!(part_name("upload", "loc", 0), "upload/loc/0");
        assert_eq!(artifact_name("upload", "loc"), "upload/loc/artifact.mp4");
        assert_eq!(
            join(&[&asset_dir("watch", "loc"), &init_name("vide1")]),
            "watch/loc/vide1_init.mp4"
        );
        assert_eq!(
            join(&[&asset_dir("watch", "loc"), &media_name("soun1", 1)]),
            "watch/loc/soun1_1.m4s"
        );
    }

    #[test]
    fn no_doubled_slashes() {
        assert_eq!(join(&["/watch/", "/loc/", "x"]), "watch/loc/x");
        assert_eq!(join(&["", "loc", "", "3"]), "loc/3");
        assert_eq!(asset_dir("watch/", ""), "watch");
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type("vide1_init.mp4"), "video/mp4");
        assert_eq!(content_type("watch/a/vide1_3.m4s"), "video/iso.segment");
        assert_eq!(content_type("manifest.mpd"), "application/dash+xml");
        assert_eq!(content_type("upload/a/0"), "application/octet-stream");
    }
}

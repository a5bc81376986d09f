//! DASH manifest (MPD) generation.

use std::fmt;

use vidi_common::{Meta, Track};

pub const MPD_SCHEMA: &str = "urn:mpeg:dash:schema:mpd:2011";
pub const ON_DEMAND_PROFILE: &str = "urn:mpeg:dash:profile:isoff-on-demand:2011";
pub const MPD_CONTENT_TYPE: &str = "application/dash+xml";

/// Segment name template shared by every representation.
pub const MEDIA_TEMPLATE: &str = "$RepresentationID$_$Number$.m4s";

/// Static on-demand MPD for a segmented asset.
///
/// Renders through `Display`; `base_url` becomes a top-level `BaseURL`
/// element when set.
#[derive(Debug, Clone, Copy)]
pub struct Mpd<'a> {
    pub meta: &'a Meta,
    pub base_url: Option<&'a str>,
}

impl<'a> Mpd<'a> {
    pub fn new(meta: &'a Meta) -> Self {
        Self {
            meta,
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: &'a str) -> Self {
        self.base_url = Some(base_url);
        self
    }
}

/// Render the manifest for `meta`.
pub fn render_mpd(meta: &Meta, base_url: Option<&str>) -> String {
    Mpd { meta, base_url }.to_string()
}

impl fmt::Display for Mpd<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(
            f,
            r#"<MPD xmlns="{MPD_SCHEMA}" profiles="{ON_DEMAND_PROFILE}" type="static" mediaPresentationDuration="PT{}S" minBufferTime="PT2S">"#,
            self.meta.duration
        )?;
        if let Some(base_url) = self.base_url {
            writeln!(f, "  <BaseURL>{}</BaseURL>", Escaped(base_url))?;
        }
        writeln!(f, r#"  <Period id="p0">"#)?;
        for track in &self.meta.tracks {
            write_adaptation_set(f, track)?;
        }
        writeln!(f, "  </Period>")?;
        writeln!(f, "</MPD>")
    }
}

fn write_adaptation_set(f: &mut fmt::Formatter<'_>, track: &Track) -> fmt::Result {
    writeln!(
        f,
        r#"    <AdaptationSet mimeType="{}" segmentAlignment="true" startWithSAP="1">"#,
        Escaped(&track.mime_type)
    )?;
    write!(
        f,
        r#"      <Representation id="{}" codecs="{}""#,
        Escaped(&track.name),
        Escaped(&track.codec.profile)
    )?;
    if let Some(rate) = track.codec.sample_rate {
        write!(f, r#" audioSamplingRate="{rate}""#)?;
    }
    writeln!(f, ">")?;
    writeln!(
        f,
        r#"        <SegmentTemplate timescale="{}" duration="{}" startNumber="{}" media="{MEDIA_TEMPLATE}" initialization="$RepresentationID${}"/>"#,
        track.segment.timescale,
        track.segment.duration,
        track.segment.start_number,
        Escaped(&track.segment.init)
    )?;
    writeln!(f, "      </Representation>")?;
    writeln!(f, "    </AdaptationSet>")
}

/// XML attribute/text escaping.
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '"' => f.write_str("&quot;")?,
                '\'' => f.write_str("&apos;")?,
                c => write!(f, "{c}")?,
            }
        }
        Ok(())
    }
}

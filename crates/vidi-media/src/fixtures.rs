//! Synthetic progressive MP4 files for tests.
//!
//! The default fixture is ten seconds of 24 fps AVC video at timescale
//! 15360 with a keyframe every second, plus 48 kHz AAC-LC audio. Chunks
//! hold one second of media per track and are interleaved in `mdat`.

use crate::fmp4::boxes::{fullbox_header, write_box, write_container_box, write_type_box, UNITY_MATRIX};

pub const VIDEO_TIMESCALE: u32 = 15360;
pub const VIDEO_FRAME_DURATION: u32 = 640;
pub const VIDEO_SAMPLES: u32 = 240;
pub const KEYFRAME_INTERVAL: u32 = 24;
pub const AUDIO_SAMPLE_RATE: u32 = 48000;
pub const AUDIO_FRAME_DURATION: u32 = 1024;
pub const AUDIO_FRAMES: u32 = 469;
pub const AUDIO_FRAME_SIZE: u32 = 24;

/// avcC payload: High profile, level 3.1, one tiny SPS and PPS.
pub const AVC_CONFIG: [u8; 17] = [
    1, 0x64, 0x00, 0x1f, 0xff, 0xe1, 0x00, 0x04, 0x67, 0x64, 0x00, 0x1f, 0x01, 0x00, 0x02, 0x68,
    0xee,
];

const MOVIE_TIMESCALE: u32 = 1000;
const LANGUAGE_UND: u16 = 0x55c4;

/// esds payload (after version and flags) for an AAC stream at 48 kHz stereo.
pub fn aac_esds(object_type: u8) -> Vec<u8> {
    // objectType(5) samplingFrequencyIndex(4) = 3, channelConfiguration(4) = 2
    let asc = (u16::from(object_type & 0x1f) << 11) | (3 << 7) | (2 << 3);

    let mut decoder_config = vec![0x40, 0x15, 0, 0, 0];
    decoder_config.extend_from_slice(&128_000u32.to_be_bytes());
    decoder_config.extend_from_slice(&128_000u32.to_be_bytes());
    decoder_config.extend_from_slice(&[0x05, 0x02]);
    decoder_config.extend_from_slice(&asc.to_be_bytes());

    let mut es = vec![0x00, 0x01, 0x00];
    es.push(0x04);
    es.push(decoder_config.len() as u8);
    es.extend_from_slice(&decoder_config);
    es.extend_from_slice(&[0x06, 0x01, 0x02]);

    let mut out = vec![0x03, es.len() as u8];
    out.extend_from_slice(&es);
    out
}

/// Builder for a synthetic MP4.
#[derive(Debug, Clone)]
pub struct Mp4Fixture {
    video: Option<VideoCodec>,
    audio: bool,
    audio_object_type: u8,
    timecode: bool,
    composition_offsets: bool,
    sync_table: bool,
    sample_dependencies: bool,
    moov_at_end: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoCodec {
    Avc,
    Hevc,
}

impl Default for Mp4Fixture {
    fn default() -> Self {
        Self {
            video: Some(VideoCodec::Avc),
            audio: true,
            audio_object_type: 2,
            timecode: false,
            composition_offsets: false,
            sync_table: true,
            sample_dependencies: false,
            moov_at_end: false,
        }
    }
}

impl Mp4Fixture {
    pub fn without_video(mut self) -> Self {
        self.video = None;
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.audio = false;
        self
    }

    /// Use an `hvc1` video sample entry.
    pub fn with_hevc(mut self) -> Self {
        self.video = Some(VideoCodec::Hevc);
        self
    }

    pub fn with_audio_object_type(mut self, object_type: u8) -> Self {
        self.audio_object_type = object_type;
        self
    }

    /// Append a `tmcd` track after the media tracks.
    pub fn with_timecode_track(mut self) -> Self {
        self.timecode = true;
        self
    }

    /// Give every video sample a two-frame composition offset.
    pub fn with_composition_offsets(mut self) -> Self {
        self.composition_offsets = true;
        self
    }

    /// Drop the video stss box, making every sample a sync sample.
    pub fn without_sync_table(mut self) -> Self {
        self.sync_table = false;
        self
    }

    /// Add an sdtp box to the video track.
    pub fn with_sample_dependencies(mut self) -> Self {
        self.sample_dependencies = true;
        self
    }

    /// Place moov after mdat.
    pub fn with_moov_at_end(mut self) -> Self {
        self.moov_at_end = true;
        self
    }

    /// Serialize the file.
    pub fn build(&self) -> Vec<u8> {
        let tracks = self.tracks();
        let ftyp = write_type_box(b"ftyp", b"isom", &[b"isom", b"iso2", b"avc1", b"mp41"]);
        let (payload, chunk_offsets) = interleave(&tracks);
        let mdat = write_box(b"mdat", &payload);

        let mut out = Vec::with_capacity(ftyp.len() + mdat.len() + 4096);
        out.extend_from_slice(&ftyp);
        if self.moov_at_end {
            let base = (ftyp.len() + 8) as u64;
            out.extend_from_slice(&mdat);
            out.extend_from_slice(&moov(&tracks, &chunk_offsets, base));
        } else {
            // stco entries have a fixed width, so the moov size does not
            // depend on the offsets it carries.
            let probe = moov(&tracks, &chunk_offsets, 0);
            let base = (ftyp.len() + probe.len() + 8) as u64;
            out.extend_from_slice(&moov(&tracks, &chunk_offsets, base));
            out.extend_from_slice(&mdat);
        }
        out
    }

    fn tracks(&self) -> Vec<FixtureTrack> {
        let mut tracks = Vec::new();
        let mut next_id = 1;

        if let Some(codec) = self.video {
            let sizes = (1..=VIDEO_SAMPLES)
                .map(|nr| {
                    if (nr - 1) % KEYFRAME_INTERVAL == 0 {
                        120
                    } else {
                        40 + (nr % 5) * 4
                    }
                })
                .collect();
            let sync = self.sync_table.then(|| {
                (1..=VIDEO_SAMPLES)
                    .step_by(KEYFRAME_INTERVAL as usize)
                    .collect()
            });
            let dependencies = self.sample_dependencies.then(|| {
                (1..=VIDEO_SAMPLES)
                    .map(|nr| if (nr - 1) % KEYFRAME_INTERVAL == 0 { 0x20 } else { 0x10 })
                    .collect()
            });
            tracks.push(FixtureTrack {
                track_id: next_id,
                handler: *b"vide",
                timescale: VIDEO_TIMESCALE,
                delta: VIDEO_FRAME_DURATION,
                entry: video_entry(codec),
                uniform_size: 0,
                sizes,
                sync,
                composition_offsets: self
                    .composition_offsets
                    .then(|| vec![(VIDEO_SAMPLES, 2 * VIDEO_FRAME_DURATION as i32)]),
                dependencies,
                chunks: vec![KEYFRAME_INTERVAL; (VIDEO_SAMPLES / KEYFRAME_INTERVAL) as usize],
                tag: 0x56,
            });
            next_id += 1;
        }

        if self.audio {
            let mut chunks = vec![47; 9];
            chunks.push(AUDIO_FRAMES - 47 * 9);
            tracks.push(FixtureTrack {
                track_id: next_id,
                handler: *b"soun",
                timescale: AUDIO_SAMPLE_RATE,
                delta: AUDIO_FRAME_DURATION,
                entry: audio_entry(self.audio_object_type),
                uniform_size: AUDIO_FRAME_SIZE,
                sizes: vec![AUDIO_FRAME_SIZE; AUDIO_FRAMES as usize],
                sync: None,
                composition_offsets: None,
                dependencies: None,
                chunks,
                tag: 0x41,
            });
            next_id += 1;
        }

        if self.timecode {
            tracks.push(FixtureTrack {
                track_id: next_id,
                handler: *b"tmcd",
                timescale: VIDEO_TIMESCALE,
                delta: VIDEO_SAMPLES * VIDEO_FRAME_DURATION,
                entry: timecode_entry(),
                uniform_size: 0,
                sizes: vec![4],
                sync: None,
                composition_offsets: None,
                dependencies: None,
                chunks: vec![1],
                tag: 0x54,
            });
        }

        tracks
    }
}

/// Deterministic payload of one sample.
pub fn sample_bytes(tag: u8, nr: u32, size: u32) -> Vec<u8> {
    (0..size)
        .map(|j| tag ^ (nr as u8).wrapping_add(j as u8))
        .collect()
}

struct FixtureTrack {
    track_id: u32,
    handler: [u8; 4],
    timescale: u32,
    delta: u32,
    entry: Vec<u8>,
    /// Non-zero when every sample has this size.
    uniform_size: u32,
    sizes: Vec<u32>,
    sync: Option<Vec<u32>>,
    composition_offsets: Option<Vec<(u32, i32)>>,
    dependencies: Option<Vec<u8>>,
    /// Samples per chunk.
    chunks: Vec<u32>,
    tag: u8,
}

impl FixtureTrack {
    fn sample_count(&self) -> u32 {
        self.sizes.len() as u32
    }

    fn duration(&self) -> u64 {
        u64::from(self.sample_count()) * u64::from(self.delta)
    }
}

/// Lay out chunks round-robin across tracks. Returns the mdat payload and
/// every track's chunk offsets relative to it.
fn interleave(tracks: &[FixtureTrack]) -> (Vec<u8>, Vec<Vec<u64>>) {
    let mut payload = Vec::new();
    let mut offsets = vec![Vec::new(); tracks.len()];
    let mut next_sample = vec![1u32; tracks.len()];
    let max_chunks = tracks.iter().map(|t| t.chunks.len()).max().unwrap_or(0);

    for chunk in 0..max_chunks {
        for (idx, track) in tracks.iter().enumerate() {
            let Some(&count) = track.chunks.get(chunk) else {
                continue;
            };
            offsets[idx].push(payload.len() as u64);
            for _ in 0..count {
                let nr = next_sample[idx];
                let size = track.sizes[(nr - 1) as usize];
                payload.extend_from_slice(&sample_bytes(track.tag, nr, size));
                next_sample[idx] += 1;
            }
        }
    }
    (payload, offsets)
}

fn moov(tracks: &[FixtureTrack], chunk_offsets: &[Vec<u64>], base: u64) -> Vec<u8> {
    let movie_duration = tracks
        .iter()
        .map(|t| t.duration() * u64::from(MOVIE_TIMESCALE) / u64::from(t.timescale))
        .max()
        .unwrap_or(0) as u32;

    let mut mvhd = Vec::with_capacity(100);
    mvhd.extend_from_slice(&fullbox_header(0, 0));
    mvhd.extend_from_slice(&[0; 8]);
    mvhd.extend_from_slice(&MOVIE_TIMESCALE.to_be_bytes());
    mvhd.extend_from_slice(&movie_duration.to_be_bytes());
    mvhd.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    mvhd.extend_from_slice(&0x0100u16.to_be_bytes());
    mvhd.extend_from_slice(&[0; 10]);
    for value in UNITY_MATRIX {
        mvhd.extend_from_slice(&value.to_be_bytes());
    }
    mvhd.extend_from_slice(&[0; 24]);
    mvhd.extend_from_slice(&(tracks.len() as u32 + 1).to_be_bytes());
    let mvhd = write_box(b"mvhd", &mvhd);

    let traks: Vec<Vec<u8>> = tracks
        .iter()
        .zip(chunk_offsets)
        .map(|(track, offsets)| trak(track, offsets, base, movie_duration))
        .collect();

    let mut children: Vec<&[u8]> = vec![&mvhd];
    children.extend(traks.iter().map(Vec::as_slice));
    write_container_box(b"moov", &children)
}

fn trak(track: &FixtureTrack, offsets: &[u64], base: u64, movie_duration: u32) -> Vec<u8> {
    let is_video = &track.handler == b"vide";

    let mut tkhd = Vec::with_capacity(84);
    tkhd.extend_from_slice(&fullbox_header(0, 3));
    tkhd.extend_from_slice(&[0; 8]);
    tkhd.extend_from_slice(&track.track_id.to_be_bytes());
    tkhd.extend_from_slice(&[0; 4]);
    tkhd.extend_from_slice(&movie_duration.to_be_bytes());
    tkhd.extend_from_slice(&[0; 12]);
    let volume: u16 = if &track.handler == b"soun" { 0x0100 } else { 0 };
    tkhd.extend_from_slice(&volume.to_be_bytes());
    tkhd.extend_from_slice(&[0; 2]);
    for value in UNITY_MATRIX {
        tkhd.extend_from_slice(&value.to_be_bytes());
    }
    let (width, height) = if is_video { (640u32, 360u32) } else { (0, 0) };
    tkhd.extend_from_slice(&(width << 16).to_be_bytes());
    tkhd.extend_from_slice(&(height << 16).to_be_bytes());
    let tkhd = write_box(b"tkhd", &tkhd);

    let mut mdhd = Vec::with_capacity(24);
    mdhd.extend_from_slice(&fullbox_header(0, 0));
    mdhd.extend_from_slice(&[0; 8]);
    mdhd.extend_from_slice(&track.timescale.to_be_bytes());
    mdhd.extend_from_slice(&(track.duration() as u32).to_be_bytes());
    mdhd.extend_from_slice(&LANGUAGE_UND.to_be_bytes());
    mdhd.extend_from_slice(&[0; 2]);
    let mdhd = write_box(b"mdhd", &mdhd);

    let mut hdlr = Vec::new();
    hdlr.extend_from_slice(&fullbox_header(0, 0));
    hdlr.extend_from_slice(&[0; 4]);
    hdlr.extend_from_slice(&track.handler);
    hdlr.extend_from_slice(&[0; 12]);
    hdlr.extend_from_slice(b"fixture\0");
    let hdlr = write_box(b"hdlr", &hdlr);

    let media_header = match &track.handler {
        b"vide" => write_box(b"vmhd", &[0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0]),
        b"soun" => write_box(b"smhd", &[0; 8]),
        _ => write_box(b"nmhd", &[0; 4]),
    };
    let url = write_box(b"url ", &fullbox_header(0, 1));
    let mut dref = fullbox_header(0, 0).to_vec();
    dref.extend_from_slice(&1u32.to_be_bytes());
    dref.extend_from_slice(&url);
    let dinf = write_container_box(b"dinf", &[&write_box(b"dref", &dref)]);

    let stbl = stbl(track, offsets, base);
    let minf = write_container_box(b"minf", &[&media_header, &dinf, &stbl]);
    let mdia = write_container_box(b"mdia", &[&mdhd, &hdlr, &minf]);
    write_container_box(b"trak", &[&tkhd, &mdia])
}

fn stbl(track: &FixtureTrack, offsets: &[u64], base: u64) -> Vec<u8> {
    let mut boxes = Vec::new();

    let mut stsd = fullbox_header(0, 0).to_vec();
    stsd.extend_from_slice(&1u32.to_be_bytes());
    stsd.extend_from_slice(&track.entry);
    boxes.push(write_box(b"stsd", &stsd));

    boxes.push(table(b"stts", &[(track.sample_count(), track.delta)]));

    if let Some(entries) = &track.composition_offsets {
        let pairs: Vec<(u32, u32)> = entries.iter().map(|&(n, o)| (n, o as u32)).collect();
        boxes.push(table(b"ctts", &pairs));
    }

    if let Some(sync) = &track.sync {
        let mut stss = fullbox_header(0, 0).to_vec();
        stss.extend_from_slice(&(sync.len() as u32).to_be_bytes());
        for nr in sync {
            stss.extend_from_slice(&nr.to_be_bytes());
        }
        boxes.push(write_box(b"stss", &stss));
    }

    // Run-length encode samples-per-chunk.
    let mut stsc = Vec::new();
    for (idx, &count) in track.chunks.iter().enumerate() {
        if stsc.last().map(|&(_, c, _): &(u32, u32, u32)| c) != Some(count) {
            stsc.push((idx as u32 + 1, count, 1));
        }
    }
    let mut stsc_payload = fullbox_header(0, 0).to_vec();
    stsc_payload.extend_from_slice(&(stsc.len() as u32).to_be_bytes());
    for (first, count, desc) in stsc {
        stsc_payload.extend_from_slice(&first.to_be_bytes());
        stsc_payload.extend_from_slice(&count.to_be_bytes());
        stsc_payload.extend_from_slice(&desc.to_be_bytes());
    }
    boxes.push(write_box(b"stsc", &stsc_payload));

    let mut stsz = fullbox_header(0, 0).to_vec();
    stsz.extend_from_slice(&track.uniform_size.to_be_bytes());
    stsz.extend_from_slice(&track.sample_count().to_be_bytes());
    if track.uniform_size == 0 {
        for size in &track.sizes {
            stsz.extend_from_slice(&size.to_be_bytes());
        }
    }
    boxes.push(write_box(b"stsz", &stsz));

    let mut stco = fullbox_header(0, 0).to_vec();
    stco.extend_from_slice(&(offsets.len() as u32).to_be_bytes());
    for offset in offsets {
        stco.extend_from_slice(&((base + offset) as u32).to_be_bytes());
    }
    boxes.push(write_box(b"stco", &stco));

    if let Some(dependencies) = &track.dependencies {
        let mut sdtp = fullbox_header(0, 0).to_vec();
        sdtp.extend_from_slice(dependencies);
        boxes.push(write_box(b"sdtp", &sdtp));
    }

    let children: Vec<&[u8]> = boxes.iter().map(Vec::as_slice).collect();
    write_container_box(b"stbl", &children)
}

fn table(box_type: &[u8; 4], entries: &[(u32, u32)]) -> Vec<u8> {
    let mut payload = fullbox_header(0, 0).to_vec();
    payload.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (a, b) in entries {
        payload.extend_from_slice(&a.to_be_bytes());
        payload.extend_from_slice(&b.to_be_bytes());
    }
    write_box(box_type, &payload)
}

fn visual_fields() -> Vec<u8> {
    let mut fields = vec![0; 6];
    fields.extend_from_slice(&1u16.to_be_bytes()); // data reference index
    fields.extend_from_slice(&[0; 16]);
    fields.extend_from_slice(&640u16.to_be_bytes());
    fields.extend_from_slice(&360u16.to_be_bytes());
    fields.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    fields.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    fields.extend_from_slice(&[0; 4]);
    fields.extend_from_slice(&1u16.to_be_bytes()); // frame count
    fields.extend_from_slice(&[0; 32]);
    fields.extend_from_slice(&0x0018u16.to_be_bytes());
    fields.extend_from_slice(&0xffffu16.to_be_bytes());
    fields
}

fn video_entry(codec: VideoCodec) -> Vec<u8> {
    let mut payload = visual_fields();
    match codec {
        VideoCodec::Avc => {
            payload.extend_from_slice(&write_box(b"avcC", &AVC_CONFIG));
            write_box(b"avc1", &payload)
        }
        VideoCodec::Hevc => {
            let mut hvcc = vec![0; 23];
            hvcc[0] = 1;
            payload.extend_from_slice(&write_box(b"hvcC", &hvcc));
            write_box(b"hvc1", &payload)
        }
    }
}

fn audio_entry(object_type: u8) -> Vec<u8> {
    let mut payload = vec![0; 6];
    payload.extend_from_slice(&1u16.to_be_bytes());
    payload.extend_from_slice(&[0; 8]); // version, revision, vendor
    payload.extend_from_slice(&2u16.to_be_bytes());
    payload.extend_from_slice(&16u16.to_be_bytes());
    payload.extend_from_slice(&[0; 4]);
    payload.extend_from_slice(&(AUDIO_SAMPLE_RATE << 16).to_be_bytes());

    let mut esds = fullbox_header(0, 0).to_vec();
    esds.extend_from_slice(&aac_esds(object_type));
    payload.extend_from_slice(&write_box(b"esds", &esds));
    write_box(b"mp4a", &payload)
}

fn timecode_entry() -> Vec<u8> {
    let mut payload = vec![0; 6];
    payload.extend_from_slice(&1u16.to_be_bytes());
    payload.extend_from_slice(&[0; 8]);
    payload.extend_from_slice(&VIDEO_TIMESCALE.to_be_bytes());
    payload.extend_from_slice(&VIDEO_FRAME_DURATION.to_be_bytes());
    payload.extend_from_slice(&[24, 0]);
    write_box(b"tmcd", &payload)
}

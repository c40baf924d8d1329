//! Matroska for camera takes.
//!
//! A take has one MJPEG video track and one 16-bit PCM audio track. Segment
//! and clusters are written with unknown sizes, like a live stream, so the
//! chunks handed out while recording form a valid file once concatenated.
//! The reader understands what the writer produces and little more.

use std::time::Duration;

use bytes::Bytes;

use crate::{MediaError, Result};

pub const MATROSKA_MIME: &str = "video/x-matroska";

const EBML: u32 = 0x1A45_DFA3;
const EBML_VERSION: u32 = 0x4286;
const EBML_READ_VERSION: u32 = 0x42F7;
const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
const DOC_TYPE: u32 = 0x4282;
const DOC_TYPE_VERSION: u32 = 0x4287;
const DOC_TYPE_READ_VERSION: u32 = 0x4285;
const SEGMENT: u32 = 0x1853_8067;
const INFO: u32 = 0x1549_A966;
const TIMESTAMP_SCALE: u32 = 0x2A_D7B1;
const MUXING_APP: u32 = 0x4D80;
const WRITING_APP: u32 = 0x5741;
const TRACKS: u32 = 0x1654_AE6B;
const TRACK_ENTRY: u32 = 0xAE;
const TRACK_NUMBER: u32 = 0xD7;
const TRACK_UID: u32 = 0x73C5;
const TRACK_TYPE: u32 = 0x83;
const CODEC_ID: u32 = 0x86;
const VIDEO: u32 = 0xE0;
const PIXEL_WIDTH: u32 = 0xB0;
const PIXEL_HEIGHT: u32 = 0xBA;
const AUDIO: u32 = 0xE1;
const SAMPLING_FREQUENCY: u32 = 0xB5;
const CHANNELS: u32 = 0x9F;
const BIT_DEPTH: u32 = 0x6264;
const CLUSTER: u32 = 0x1F43_B675;
const TIMESTAMP: u32 = 0xE7;
const SIMPLE_BLOCK: u32 = 0xA3;

const APP: &str = concat!("duet-media ", env!("CARGO_PKG_VERSION"));
const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
const NANOS_PER_MS: u64 = 1_000_000;

const VIDEO_TRACK: u64 = 1;
const AUDIO_TRACK: u64 = 2;
const MJPEG: &str = "V_MJPEG";
const PCM: &str = "A_PCM/INT/LIT";

/// Shape of the two tracks, fixed for the whole take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackLayout {
    pub width: u32,
    pub height: u32,
    pub sample_rate: u32,
    pub channels: u16,
}

/// A JPEG picture and when it was taken, relative to the start of the take.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub at: Duration,
    pub jpeg: Bytes,
}

/// Everything a take holds, demuxed.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraTake {
    pub layout: TrackLayout,
    /// Interleaved 16-bit little-endian PCM
    pub audio: Bytes,
    /// Ordered by time
    pub frames: Vec<VideoFrame>,
}

/// Builds the EBML header, the open segment and the track list.
pub fn header(layout: &TrackLayout) -> Vec<u8> {
    let mut out = Vec::new();
    master(&mut out, EBML, |b| {
        uint(b, EBML_VERSION, 1);
        uint(b, EBML_READ_VERSION, 1);
        uint(b, EBML_MAX_ID_LENGTH, 4);
        uint(b, EBML_MAX_SIZE_LENGTH, 8);
        string(b, DOC_TYPE, "matroska");
        uint(b, DOC_TYPE_VERSION, 4);
        uint(b, DOC_TYPE_READ_VERSION, 2);
    });

    write_id(&mut out, SEGMENT);
    out.extend_from_slice(&UNKNOWN_SIZE);

    master(&mut out, INFO, |b| {
        uint(b, TIMESTAMP_SCALE, NANOS_PER_MS);
        string(b, MUXING_APP, APP);
        string(b, WRITING_APP, APP);
    });
    master(&mut out, TRACKS, |b| {
        master(b, TRACK_ENTRY, |t| {
            uint(t, TRACK_NUMBER, VIDEO_TRACK);
            uint(t, TRACK_UID, VIDEO_TRACK);
            uint(t, TRACK_TYPE, 1);
            string(t, CODEC_ID, MJPEG);
            master(t, VIDEO, |v| {
                uint(v, PIXEL_WIDTH, layout.width as u64);
                uint(v, PIXEL_HEIGHT, layout.height as u64);
            });
        });
        master(b, TRACK_ENTRY, |t| {
            uint(t, TRACK_NUMBER, AUDIO_TRACK);
            uint(t, TRACK_UID, AUDIO_TRACK);
            uint(t, TRACK_TYPE, 2);
            string(t, CODEC_ID, PCM);
            master(t, AUDIO, |a| {
                float(a, SAMPLING_FREQUENCY, layout.sample_rate as f64);
                uint(a, CHANNELS, layout.channels as u64);
                uint(a, BIT_DEPTH, 16);
            });
        });
    });
    out
}

/// Builds one cluster starting at `start`. The PCM block plays from the
/// cluster start, frames are placed by their own timestamps.
pub fn cluster(start: Duration, audio: &[u8], frames: &[VideoFrame]) -> Vec<u8> {
    let start_ms = start.as_millis() as u64;
    let video_len: usize = frames.iter().map(|f| f.jpeg.len() + 16).sum();
    let mut out = Vec::with_capacity(audio.len() + video_len + 32);
    write_id(&mut out, CLUSTER);
    out.extend_from_slice(&UNKNOWN_SIZE);
    uint(&mut out, TIMESTAMP, start_ms);

    if !audio.is_empty() {
        simple_block(&mut out, AUDIO_TRACK, 0, audio);
    }
    for frame in frames {
        let offset = (frame.at.as_millis() as i64 - start_ms as i64)
            .clamp(i16::MIN as i64, i16::MAX as i64) as i16;
        simple_block(&mut out, VIDEO_TRACK, offset, &frame.jpeg);
    }
    out
}

fn simple_block(out: &mut Vec<u8>, track: u64, offset: i16, data: &[u8]) {
    write_id(out, SIMPLE_BLOCK);
    write_size(out, data.len() as u64 + 4);
    // Track numbers stay below 127, so the vint is a single byte.
    out.push(0x80 | track as u8);
    out.extend_from_slice(&offset.to_be_bytes());
    // Keyframe; every MJPEG picture and PCM block stands alone.
    out.push(0x80);
    out.extend_from_slice(data);
}

fn master(out: &mut Vec<u8>, id: u32, body: impl FnOnce(&mut Vec<u8>)) {
    let mut inner = Vec::new();
    body(&mut inner);
    element(out, id, &inner);
}

fn uint(out: &mut Vec<u8>, id: u32, value: u64) {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    element(out, id, &bytes[skip..]);
}

fn float(out: &mut Vec<u8>, id: u32, value: f64) {
    element(out, id, &value.to_be_bytes());
}

fn string(out: &mut Vec<u8>, id: u32, value: &str) {
    element(out, id, value.as_bytes());
}

fn element(out: &mut Vec<u8>, id: u32, payload: &[u8]) {
    write_id(out, id);
    write_size(out, payload.len() as u64);
    out.extend_from_slice(payload);
}

/// IDs keep their length marker, so the significant bytes are the encoding.
fn write_id(out: &mut Vec<u8>, id: u32) {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().position(|&b| b != 0).unwrap_or(3);
    out.extend_from_slice(&bytes[skip..]);
}

/// Shortest vint for `size`. The all-ones value of each length is reserved.
fn write_size(out: &mut Vec<u8>, size: u64) {
    let mut len = 1;
    while len < 8 && size >= (1u64 << (7 * len)) - 1 {
        len += 1;
    }
    let value = size | (1u64 << (7 * len));
    out.extend_from_slice(&value.to_be_bytes()[8 - len..]);
}

fn malformed(what: &str) -> MediaError {
    MediaError::UnsupportedFormat(format!("malformed matroska: {what}"))
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn done(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| malformed("truncated element"))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn id(&mut self) -> Result<u32> {
        let first = self.take(1)?[0];
        let len = first.leading_zeros() as usize + 1;
        if len > 4 {
            return Err(malformed("element id"));
        }
        let rest = self.take(len - 1)?;
        Ok(rest
            .iter()
            .fold(first as u32, |id, &b| (id << 8) | b as u32))
    }

    /// `None` for the unknown size.
    fn size(&mut self) -> Result<Option<u64>> {
        let (value, len) = self.vint()?;
        Ok((value != (1u64 << (7 * len)) - 1).then_some(value))
    }

    fn vint(&mut self) -> Result<(u64, usize)> {
        let first = self.take(1)?[0];
        let len = first.leading_zeros() as usize + 1;
        if len > 8 {
            return Err(malformed("vint"));
        }
        let marker_free = if len == 8 { 0 } else { first as u64 & (0xFF >> len) };
        let rest = self.take(len - 1)?;
        let value = rest.iter().fold(marker_free, |v, &b| (v << 8) | b as u64);
        Ok((value, len))
    }
}

fn read_uint(payload: &[u8]) -> u64 {
    payload.iter().fold(0, |v, &b| (v << 8) | b as u64)
}

fn read_float(payload: &[u8]) -> Result<f64> {
    match payload.len() {
        4 => Ok(f32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as f64),
        8 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(payload);
            Ok(f64::from_be_bytes(bytes))
        }
        _ => Err(malformed("float size")),
    }
}

#[derive(Debug, Default)]
struct TrackEntry {
    number: u64,
    codec: String,
    width: u32,
    height: u32,
    sample_rate: u32,
    channels: u16,
    bit_depth: u8,
}

/// Splits a SimpleBlock into track number, absolute time and payload.
fn read_block(payload: &[u8], cluster_time: u64, scale: u64) -> Result<(u64, Duration, &[u8])> {
    let mut block = Reader {
        data: payload,
        pos: 0,
    };
    let (number, _) = block.vint()?;
    let offset = block.take(2)?;
    let offset = i16::from_be_bytes([offset[0], offset[1]]) as i64;
    let _flags = block.take(1)?;
    let ticks = (cluster_time as i64 + offset).max(0) as u64;
    Ok((
        number,
        Duration::from_nanos(ticks.saturating_mul(scale)),
        &payload[block.pos..],
    ))
}

/// Demuxes a take written by [`header`] and [`cluster`].
pub fn read(data: &[u8]) -> Result<CameraTake> {
    let mut reader = Reader { data, pos: 0 };
    let mut scale = NANOS_PER_MS;
    let mut tracks: Vec<TrackEntry> = Vec::new();
    let mut cluster_time = 0u64;
    let mut audio = Vec::new();
    let mut frames = Vec::new();
    let mut seen_ebml = false;

    while !reader.done() {
        let id = reader.id()?;
        let size = reader.size()?;
        match id {
            // Masters are walked into, their children follow directly.
            SEGMENT | INFO | TRACKS | VIDEO | AUDIO => continue,
            TRACK_ENTRY => {
                tracks.push(TrackEntry::default());
                continue;
            }
            CLUSTER => {
                cluster_time = 0;
                continue;
            }
            _ => {}
        }

        let size = size.ok_or_else(|| malformed("unknown size on a leaf"))?;
        let payload = reader.take(usize::try_from(size).map_err(|_| malformed("size"))?)?;
        if id == SIMPLE_BLOCK {
            let (number, at, body) = read_block(payload, cluster_time, scale)?;
            match tracks.iter().find(|t| t.number == number) {
                Some(t) if t.codec == PCM => audio.extend_from_slice(body),
                Some(t) if t.codec == MJPEG => frames.push(VideoFrame {
                    at,
                    jpeg: Bytes::copy_from_slice(body),
                }),
                _ => {}
            }
            continue;
        }

        match (id, tracks.last_mut()) {
            (EBML, _) => seen_ebml = true,
            (TIMESTAMP_SCALE, _) => scale = read_uint(payload).max(1),
            (TIMESTAMP, _) => cluster_time = read_uint(payload),
            (TRACK_NUMBER, Some(t)) => t.number = read_uint(payload),
            (CODEC_ID, Some(t)) => t.codec = String::from_utf8_lossy(payload).into_owned(),
            (PIXEL_WIDTH, Some(t)) => t.width = read_uint(payload) as u32,
            (PIXEL_HEIGHT, Some(t)) => t.height = read_uint(payload) as u32,
            (SAMPLING_FREQUENCY, Some(t)) => t.sample_rate = read_float(payload)? as u32,
            (CHANNELS, Some(t)) => t.channels = read_uint(payload) as u16,
            (BIT_DEPTH, Some(t)) => t.bit_depth = read_uint(payload) as u8,
            _ => {}
        }
    }

    if !seen_ebml {
        return Err(malformed("missing EBML header"));
    }
    let video = tracks.iter().find(|t| t.codec == MJPEG);
    let sound = tracks
        .iter()
        .find(|t| t.codec == PCM)
        .ok_or_else(|| malformed("no PCM track"))?;
    if sound.bit_depth != 16 {
        return Err(MediaError::UnsupportedFormat(format!(
            "{}-bit PCM",
            sound.bit_depth
        )));
    }

    frames.sort_by_key(|f| f.at);
    Ok(CameraTake {
        layout: TrackLayout {
            width: video.map_or(0, |t| t.width),
            height: video.map_or(0, |t| t.height),
            sample_rate: sound.sample_rate,
            channels: sound.channels,
        },
        audio: Bytes::from(audio),
        frames,
    })
}

//! Decoding sources into interleaved float samples.

use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as DecodeError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::{MediaError, MediaSource, Result};

/// Decoded, interleaved samples ready for an output stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Track {
    pub(crate) samples: Vec<f32>,
    pub(crate) channels: u16,
    pub(crate) sample_rate: u32,
}

impl Track {
    /// Decodes the first audio track of any format `symphonia` can read
    /// (WAV, MP3, FLAC, Ogg Vorbis, AAC in MP4).
    pub(crate) fn decode(source: &MediaSource) -> Result<Self> {
        let unsupported = || MediaError::UnsupportedFormat(source.mime().to_string());

        let stream = MediaSourceStream::new(
            Box::new(Cursor::new(source.data().clone())),
            Default::default(),
        );
        let mut hint = Hint::new();
        hint.mime_type(source.mime());
        if let Some(extension) = Path::new(source.name())
            .extension()
            .and_then(|e| e.to_str())
        {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|_| unsupported())?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(unsupported)?;
        let track_id = track.id;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|_| unsupported())?;

        let mut samples = Vec::new();
        let mut layout = None;
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(DecodeError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(DecodeError::ResetRequired) => break,
                Err(e) => return Err(MediaError::UnsupportedFormat(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    layout.get_or_insert((spec.channels.count() as u16, spec.rate));
                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buffer.samples());
                }
                // Corrupt packets are skipped, the rest of the stream may be fine.
                Err(DecodeError::DecodeError(e)) => debug!(error = e, "skipping packet"),
                Err(e) => return Err(MediaError::UnsupportedFormat(e.to_string())),
            }
        }

        match layout {
            Some((channels, sample_rate)) if channels > 0 && sample_rate > 0 => Ok(Self {
                samples,
                channels,
                sample_rate,
            }),
            _ => Err(unsupported()),
        }
    }

    /// Wraps interleaved 16-bit little-endian PCM.
    pub(crate) fn from_pcm16(data: &[u8], channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 || sample_rate == 0 {
            return Err(MediaError::UnsupportedFormat(format!(
                "pcm with {channels} channels at {sample_rate} Hz"
            )));
        }
        let samples = data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
            .collect();
        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    pub(crate) fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }
}

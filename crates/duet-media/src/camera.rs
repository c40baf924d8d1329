//! Camera and microphone capture into a Matroska take.
//!
//! Frames come from `nokhwa` on its own thread, samples from `cpal` on the
//! audio thread. Both feed one [`Mux`]; the audio thread cuts a cluster
//! every `chunk_interval` and hands it to the session as a chunk.
//!
//! ## Size notes
//!
//! MJPEG at 720p is roughly 100KiB per frame, so a minute at 30fps is around
//! 180MiB held in memory until the take is replaced.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use bytes::Bytes;
use cpal::Host;
use cpal::traits::StreamTrait;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType};
use nokhwa::{Buffer, CallbackCamera};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::capture::{build_input_stream, default_input};
use crate::mkv::{self, MATROSKA_MIME, TrackLayout, VideoFrame};
use crate::{CaptureCallback, CaptureDevice, CaptureEvent, CaptureStream, Result, TakeFormat};

const JPEG_QUALITY: u8 = 80;

/// Interleaves frames and samples into Matroska clusters.
#[derive(Debug)]
struct Mux {
    sample_rate: u32,
    channels: u16,
    chunk_samples: usize,
    active: bool,
    started: Option<Instant>,
    // Picture size, known from the first frame.
    resolution: Option<(u32, u32)>,
    header_written: bool,
    audio: Vec<f32>,
    audio_frames_written: u64,
    frames: Vec<VideoFrame>,
}

impl Mux {
    fn new(sample_rate: u32, channels: u16, chunk_samples: usize) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            chunk_samples: chunk_samples.max(1),
            active: false,
            started: None,
            resolution: None,
            header_written: false,
            audio: Vec::new(),
            audio_frames_written: 0,
            frames: Vec::new(),
        }
    }

    fn start(&mut self, now: Instant) {
        self.active = true;
        self.started = Some(now);
    }

    /// Time since [`Mux::start`], or `None` before it.
    fn elapsed(&self) -> Option<Duration> {
        self.started.map(|started| started.elapsed())
    }

    fn push_frame(&mut self, at: Duration, width: u32, height: u32, jpeg: Bytes) {
        if !self.active {
            return;
        }
        self.resolution.get_or_insert((width, height));
        self.frames.push(VideoFrame { at, jpeg });
    }

    /// Buffers samples and returns a chunk once enough audio piled up. The
    /// first chunk waits for a frame so the header carries the picture size.
    fn push_audio(&mut self, samples: &[f32]) -> Option<Bytes> {
        if !self.active {
            return None;
        }
        self.audio.extend_from_slice(samples);
        if self.audio.len() < self.chunk_samples || self.resolution.is_none() {
            return None;
        }
        Some(self.cut())
    }

    /// Stops accepting input and returns what is left.
    fn flush(&mut self) -> Option<Bytes> {
        self.active = false;
        if self.audio.is_empty() && self.frames.is_empty() {
            return None;
        }
        Some(self.cut())
    }

    fn cut(&mut self) -> Bytes {
        let mut out = Vec::new();
        if !self.header_written {
            let (width, height) = self.resolution.unwrap_or((0, 0));
            out = mkv::header(&TrackLayout {
                width,
                height,
                sample_rate: self.sample_rate,
                channels: self.channels,
            });
            self.header_written = true;
        }

        let channels = self.channels as usize;
        // Only whole frames, a partial one waits for the next cut.
        let whole = self.audio.len() - self.audio.len() % channels;
        let start = Duration::from_secs_f64(
            self.audio_frames_written as f64 / self.sample_rate.max(1) as f64,
        );
        let pcm = pcm16_bytes(&self.audio[..whole]);
        out.extend(mkv::cluster(start, &pcm, &self.frames));

        self.audio_frames_written += (whole / channels) as u64;
        self.audio.drain(..whole);
        self.frames.clear();
        Bytes::from(out)
    }
}

type MuxHandle = Arc<Mutex<Mux>>;

/// Captures a webcam and the default microphone.
pub struct CameraCapture {
    host: Host,
    camera: u32,
    chunk_interval: Duration,
}

impl CameraCapture {
    pub fn new(camera: u32, chunk_interval: Duration) -> Self {
        Self {
            host: cpal::default_host(),
            camera,
            chunk_interval,
        }
    }
}

impl CaptureDevice for CameraCapture {
    type Stream = CameraStream;

    fn acquire(&mut self, callback: CaptureCallback) -> Result<CameraStream> {
        let (device, config) = default_input(&self.host)?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels();
        let chunk_samples = (self.chunk_interval.as_secs_f64()
            * sample_rate as f64
            * channels as f64) as usize;
        let mux = Arc::new(Mutex::new(Mux::new(sample_rate, channels, chunk_samples)));

        let audio = {
            let mux = mux.clone();
            let callback_2 = callback.clone();
            build_input_stream(
                &device,
                config,
                move |samples| {
                    // Delivered under the lock so chunks keep their order.
                    let mut mux = mux.lock();
                    if let Some(chunk) = mux.push_audio(samples) {
                        callback_2(CaptureEvent::Chunk(chunk));
                    }
                },
                callback.clone(),
            )?
        };

        let camera = {
            let mux = mux.clone();
            let format =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
            CallbackCamera::new(CameraIndex::Index(self.camera), format, move |buffer| {
                let resolution = buffer.resolution();
                match encode_frame(&buffer) {
                    Ok(jpeg) => {
                        let mut mux = mux.lock();
                        if let Some(at) = mux.elapsed() {
                            mux.push_frame(at, resolution.width(), resolution.height(), jpeg);
                        }
                    }
                    Err(e) => warn!(error = %e, "dropping camera frame"),
                }
            })?
        };
        info!(camera = self.camera, "Camera acquired");

        Ok(CameraStream {
            camera: Some(camera),
            audio: Some(audio),
            mux,
            callback,
        })
    }
}

/// Handle to an acquired camera and microphone. When dropped or stopped,
/// both devices are released.
pub struct CameraStream {
    // Presence of the devices indicates they are still held.
    camera: Option<CallbackCamera>,
    audio: Option<cpal::Stream>,
    mux: MuxHandle,
    callback: CaptureCallback,
}

impl CaptureStream for CameraStream {
    fn format(&self) -> TakeFormat {
        TakeFormat::new(MATROSKA_MIME)
    }

    fn start(&mut self) -> Result<()> {
        let (Some(camera), Some(audio)) = (self.camera.as_mut(), self.audio.as_ref()) else {
            return Err(anyhow!("capture stream already stopped").into());
        };

        self.mux.lock().start(Instant::now());
        if let Err(e) = camera.open_stream() {
            self.mux.lock().active = false;
            return Err(e.into());
        }
        if let Err(e) = audio.play() {
            self.mux.lock().active = false;
            camera.stop_stream().ok();
            return Err(e.into());
        }
        Ok(())
    }

    fn stop(&mut self) {
        if self.camera.is_none() && self.audio.is_none() {
            return;
        }
        info!("Ending capture.");
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                warn!(error = %e, "failed to stop camera stream");
            }
        }
        if let Some(audio) = self.audio.take() {
            audio.pause().ok();
            // Dropping the stream joins the device thread and releases the device.
            drop(audio);
        }

        // Delivered under the lock so nothing from the device threads can
        // interleave with the final chunk.
        let mut mux = self.mux.lock();
        if let Some(chunk) = mux.flush() {
            (self.callback)(CaptureEvent::Chunk(chunk));
        }
        (self.callback)(CaptureEvent::Stopped);
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// MJPEG cameras hand out JPEG already, anything else is re-encoded.
fn encode_frame(buffer: &Buffer) -> anyhow::Result<Bytes> {
    if buffer.source_frame_format() == FrameFormat::MJPEG {
        return Ok(Bytes::copy_from_slice(buffer.buffer()));
    }
    let rgb = buffer.decode_image::<RgbFormat>()?;
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(Bytes::from(jpeg))
}

/// Encodes float samples as 16-bit little-endian PCM.
fn pcm16_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Asks the OS for camera access. Only macOS needs this before a camera can
/// be opened; elsewhere it does nothing.
pub fn request_camera_access() {
    #[cfg(target_os = "macos")]
    nokhwa::nokhwa_initialize(|granted| info!(granted, "Camera access"));
}

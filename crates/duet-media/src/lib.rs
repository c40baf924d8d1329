//! Playback and capture backends for duet.
//!
//! The session controller only talks to the [`MediaElement`] and
//! [`CaptureDevice`] traits. The `cpal` and `nokhwa` implementations live
//! next to them so the desktop app can use the default devices.

mod buffer;
mod camera;
mod capture;
mod element;
mod mkv;
mod player;
mod source;
mod take;
mod track;
mod video;

use std::sync::Arc;

pub use buffer::RecordingBuffer;
pub use camera::{CameraCapture, CameraStream, request_camera_access};
pub use capture::{CaptureDevice, CaptureStream};
pub use duet_core::{CaptureEvent, MediaEvent};
pub use element::{MediaElement, PlaybackStatus};
pub use mkv::{MATROSKA_MIME, VideoFrame};
pub use player::CpalPlayer;
pub use source::MediaSource;
pub use take::{RecordedTake, TakeFormat};
use thiserror::Error;
pub use video::TakePlayer;

#[derive(Debug, Error)]
pub enum MediaError {
    /// generic anyhow error
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    /// No recording device available
    #[error("no input device available")]
    NoInputDevice,
    /// No playback device available
    #[error("no output device available")]
    NoOutputDevice,
    /// Sample format not supported
    #[error("sample format not supported: {0}")]
    SampleFormatNotSupported(String),
    /// The source could not be decoded for playback
    #[error("unsupported media format: {0}")]
    UnsupportedFormat(String),
    /// Play was requested without a loaded source
    #[error("no source loaded")]
    NoSource,
    /// Camera missing, busy or not permitted
    #[error("camera error: {0}")]
    Camera(#[from] nokhwa::NokhwaError),
    /// Build stream error
    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),
    /// Play stream error
    #[error(transparent)]
    PlayStream(#[from] cpal::PlayStreamError),
}

pub type Result<T> = std::result::Result<T, MediaError>;

/// Receives transport events from a playback element. Called from device
/// threads as well as from the owning thread.
pub type MediaCallback = Arc<dyn Fn(MediaEvent) + Send + Sync>;

/// Receives capture events in capture order. Called from device threads.
pub type CaptureCallback = Arc<dyn Fn(CaptureEvent) + Send + Sync>;

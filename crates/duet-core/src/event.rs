//! Event types reported by media and capture devices.
//!
//! These events are used by the playback and capture backends to
//! communicate without depending on any specific UI framework.

use bytes::Bytes;

/// Which playback element an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSlot {
    /// The selected audio track
    Audio,
    /// The recorded take
    Video,
}

/// Transport changes reported by a playback element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    Play,
    Pause,
    Ended,
    Seeking,
    Seeked,
}

/// Events emitted by an active capture stream, in capture order.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// A fragment of encoded media
    Chunk(Bytes),
    /// The device stopped on its own (unplugged, revoked, driver error)
    Failed(String),
    /// The stream was stopped; no chunks follow this event
    Stopped,
}

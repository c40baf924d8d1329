use std::time::Duration;

use crate::{MediaSource, Result};

/// Snapshot of a playback element's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub paused: bool,
    pub ended: bool,
    pub seeking: bool,
    pub position: Duration,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            paused: true,
            ended: false,
            seeking: false,
            position: Duration::ZERO,
        }
    }
}

impl PlaybackStatus {
    /// Playing audio: not paused and not at the end.
    pub fn is_playing(&self) -> bool {
        !self.paused && !self.ended
    }

    /// Playing picture: additionally not in the middle of a seek.
    pub fn is_playing_steady(&self) -> bool {
        self.is_playing() && !self.seeking
    }
}

/// A single playback handle (the selected track or the recorded take).
///
/// Implementations report every transport change through their
/// [`MediaCallback`](crate::MediaCallback), including changes made through
/// these methods.
pub trait MediaElement {
    /// Replaces the loaded source. `None` unloads. A source that cannot be
    /// played leaves the element empty and returns the reason.
    fn load(&mut self, source: Option<MediaSource>) -> Result<()>;

    fn has_source(&self) -> bool;

    /// Starts or resumes playback from the current position.
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn seek(&mut self, position: Duration);

    fn status(&self) -> PlaybackStatus;
}

//! Playback of recorded takes.

use std::time::Duration;

use tracing::debug;

use crate::mkv::{self, MATROSKA_MIME, VideoFrame};
use crate::track::Track;
use crate::{CpalPlayer, MediaCallback, MediaElement, MediaError, MediaSource, PlaybackStatus, Result};

/// A [`MediaElement`] for camera takes. The sound plays through a
/// [`CpalPlayer`], which also keeps the clock; pictures are looked up by
/// position for whatever draws them.
pub struct TakePlayer {
    sound: CpalPlayer,
    frames: Vec<VideoFrame>,
    size: (u32, u32),
    name: Option<String>,
}

impl TakePlayer {
    pub fn new(name: &'static str, notify: MediaCallback) -> Self {
        Self {
            sound: CpalPlayer::new(name, notify),
            frames: Vec::new(),
            size: (0, 0),
            name: None,
        }
    }

    /// Name of the loaded take.
    pub fn take_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Picture size as recorded.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Index of the frame for the current position: the last one taken at
    /// or before it, or the first one before any was taken.
    pub fn frame_index(&self) -> Option<usize> {
        frame_at(&self.frames, self.sound.status().position)
    }

    pub fn frame(&self, index: usize) -> Option<&VideoFrame> {
        self.frames.get(index)
    }
}

fn frame_at(frames: &[VideoFrame], position: Duration) -> Option<usize> {
    if frames.is_empty() {
        return None;
    }
    Some(frames.partition_point(|f| f.at <= position).saturating_sub(1))
}

impl MediaElement for TakePlayer {
    fn load(&mut self, source: Option<MediaSource>) -> Result<()> {
        self.sound.load_track(None);
        self.frames.clear();
        self.size = (0, 0);
        self.name = None;

        let Some(source) = source else {
            return Ok(());
        };
        if source.mime() != MATROSKA_MIME {
            return Err(MediaError::UnsupportedFormat(source.mime().to_string()));
        }

        let take = mkv::read(source.data())?;
        let track = Track::from_pcm16(&take.audio, take.layout.channels, take.layout.sample_rate)?;
        debug!(
            source = source.name(),
            frames = take.frames.len(),
            width = take.layout.width,
            height = take.layout.height,
            audio_frames = track.frames(),
            "take loaded"
        );
        self.sound.load_track(Some(track));
        self.frames = take.frames;
        self.size = (take.layout.width, take.layout.height);
        self.name = Some(source.name().to_string());
        Ok(())
    }

    fn has_source(&self) -> bool {
        self.sound.has_source()
    }

    fn play(&mut self) -> Result<()> {
        self.sound.play()
    }

    fn pause(&mut self) {
        self.sound.pause()
    }

    fn seek(&mut self, position: Duration) {
        self.sound.seek(position)
    }

    fn status(&self) -> PlaybackStatus {
        self.sound.status()
    }
}

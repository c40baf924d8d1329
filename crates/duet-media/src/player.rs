//! Playback of in-memory sources through the default output device.

use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Host, Sample, SizedSample};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::track::Track;
use crate::{
    MediaCallback, MediaElement, MediaError, MediaEvent, MediaSource, PlaybackStatus, Result,
};

/// Transport shared with the output callback. The cursor counts source frames.
#[derive(Debug)]
struct Transport {
    cursor: f64,
    paused: bool,
    ended: bool,
    seeking: bool,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            cursor: 0.0,
            paused: true,
            ended: false,
            seeking: false,
        }
    }
}

impl Transport {
    /// Unpauses, starting over when the end was reached. Returns false when
    /// already playing.
    fn resume(&mut self) -> bool {
        if !self.paused {
            return false;
        }
        if self.ended {
            self.cursor = 0.0;
            self.ended = false;
        }
        self.paused = false;
        true
    }
}

/// Fills one output buffer. Returns true when this call reached the end of
/// the track.
fn render<T>(
    track: &Track,
    transport: &mut Transport,
    out: &mut [T],
    out_channels: usize,
    step: f64,
) -> bool
where
    T: Sample + FromSample<f32>,
{
    if transport.paused || transport.ended {
        out.fill(T::EQUILIBRIUM);
        return false;
    }

    let frames = track.frames();
    let channels = track.channels as usize;
    for frame in out.chunks_mut(out_channels) {
        let index = transport.cursor as usize;
        if index >= frames {
            frame.fill(T::EQUILIBRIUM);
            continue;
        }
        for (c, sample) in frame.iter_mut().enumerate() {
            *sample = T::from_sample(track.samples[index * channels + c.min(channels - 1)]);
        }
        transport.cursor += step;
    }

    if transport.cursor as usize >= frames {
        transport.ended = true;
        transport.paused = true;
        return true;
    }
    false
}

/// A [`MediaElement`] backed by the default `cpal` output device.
pub struct CpalPlayer {
    host: Host,
    name: &'static str,
    notify: MediaCallback,
    track: Option<Arc<Track>>,
    transport: Arc<Mutex<Transport>>,
    // Built on first play and dropped whenever the source changes.
    stream: Option<cpal::Stream>,
}

impl CpalPlayer {
    pub fn new(name: &'static str, notify: MediaCallback) -> Self {
        Self {
            host: cpal::default_host(),
            name,
            notify,
            track: None,
            transport: Arc::new(Mutex::new(Transport::default())),
            stream: None,
        }
    }

    /// Swaps in already decoded samples, pausing whatever played before.
    pub(crate) fn load_track(&mut self, track: Option<Track>) {
        let was_playing = !self.transport.lock().paused;
        self.stream = None;
        *self.transport.lock() = Transport::default();
        if was_playing {
            (self.notify)(MediaEvent::Pause);
        }
        self.track = track.map(Arc::new);
    }

    fn build_stream(&self, track: Arc<Track>) -> Result<cpal::Stream> {
        let device = self
            .host
            .default_output_device()
            .ok_or(MediaError::NoOutputDevice)?;
        let config = device
            .default_output_config()
            .map_err(|_| MediaError::NoOutputDevice)?;

        info!(
            player = self.name,
            device_name = %device.name().unwrap_or_default(),
            config = ?config,
            "Playing on device"
        );

        match config.sample_format() {
            cpal::SampleFormat::I16 => self.output_stream::<i16>(&device, config.into(), track),
            cpal::SampleFormat::I32 => self.output_stream::<i32>(&device, config.into(), track),
            cpal::SampleFormat::F32 => self.output_stream::<f32>(&device, config.into(), track),
            sample_format => Err(MediaError::SampleFormatNotSupported(format!(
                "{:?}",
                sample_format
            ))),
        }
    }

    fn output_stream<T>(
        &self,
        device: &cpal::Device,
        config: cpal::StreamConfig,
        track: Arc<Track>,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let out_channels = config.channels as usize;
        let step = track.sample_rate as f64 / config.sample_rate.0 as f64;
        let transport = self.transport.clone();
        let notify = self.notify.clone();
        let name = self.name;

        let err_fn = move |err| {
            error!(player = name, "an error occurred on output stream: {}", err);
        };

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [T], _: &_| {
                let ended = render(&track, &mut transport.lock(), data, out_channels, step);
                if ended {
                    notify(MediaEvent::Ended);
                }
            },
            err_fn,
            None,
        )?;
        Ok(stream)
    }
}

impl MediaElement for CpalPlayer {
    fn load(&mut self, source: Option<MediaSource>) -> Result<()> {
        self.load_track(None);
        let Some(source) = source else {
            return Ok(());
        };

        let track = Track::decode(&source)?;
        debug!(
            player = self.name,
            source = source.name(),
            frames = track.frames(),
            sample_rate = track.sample_rate,
            "source loaded"
        );
        self.load_track(Some(track));
        Ok(())
    }

    fn has_source(&self) -> bool {
        self.track.is_some()
    }

    fn play(&mut self) -> Result<()> {
        let track = self.track.clone().ok_or(MediaError::NoSource)?;
        if !self.transport.lock().paused {
            return Ok(());
        }

        if self.stream.is_none() {
            self.stream = Some(self.build_stream(track)?);
        }
        self.transport.lock().resume();
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.play() {
                self.transport.lock().paused = true;
                return Err(e.into());
            }
        }
        (self.notify)(MediaEvent::Play);
        Ok(())
    }

    fn pause(&mut self) {
        let was_playing = {
            let mut transport = self.transport.lock();
            let was_playing = !transport.paused;
            transport.paused = true;
            was_playing
        };
        if let Some(stream) = &self.stream {
            stream.pause().ok();
        }
        if was_playing {
            (self.notify)(MediaEvent::Pause);
        }
    }

    fn seek(&mut self, position: Duration) {
        let Some(track) = &self.track else {
            return;
        };

        self.transport.lock().seeking = true;
        (self.notify)(MediaEvent::Seeking);
        {
            let mut transport = self.transport.lock();
            let frames = track.frames() as f64;
            transport.cursor = (position.as_secs_f64() * track.sample_rate as f64).min(frames);
            transport.ended = transport.cursor >= frames;
            transport.seeking = false;
        }
        (self.notify)(MediaEvent::Seeked);
    }

    fn status(&self) -> PlaybackStatus {
        let transport = self.transport.lock();
        let position = match &self.track {
            Some(track) => Duration::from_secs_f64(transport.cursor / track.sample_rate as f64),
            None => Duration::ZERO,
        };
        PlaybackStatus {
            paused: transport.paused,
            ended: transport.ended,
            seeking: transport.seeking,
            position,
        }
    }
}

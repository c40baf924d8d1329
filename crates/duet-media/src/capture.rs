//! Capture seam. There can only be one active capture stream at a time and
//! the chunks it produces are handed to the session through a callback;
//! storage is not managed here.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{FromSample, Host, Sample};
use tracing::{error, info};

use crate::take::TakeFormat;
use crate::{CaptureCallback, CaptureEvent, MediaError, Result};

/// An acquired capture device. Dropping it releases the device.
pub trait CaptureStream {
    /// Container the chunks of this stream assemble into.
    fn format(&self) -> TakeFormat;

    /// Begins delivering chunks.
    fn start(&mut self) -> Result<()>;

    /// Halts the device, delivers the last partial chunk and then
    /// [`CaptureEvent::Stopped`]. Calling it again does nothing.
    fn stop(&mut self);
}

/// Source of capture streams.
pub trait CaptureDevice {
    type Stream: CaptureStream;

    /// Opens the device without delivering anything yet. Fails when the
    /// device is missing or access is denied.
    fn acquire(&mut self, callback: CaptureCallback) -> Result<Self::Stream>;
}

/// The default microphone and its preferred config.
pub(crate) fn default_input(host: &Host) -> Result<(cpal::Device, cpal::SupportedStreamConfig)> {
    let device = host
        .default_input_device()
        .ok_or(MediaError::NoInputDevice)?;
    let config = device
        .default_input_config()
        .map_err(|_| MediaError::NoInputDevice)?;
    info!(device_name = %device.name().unwrap_or_default(), config = ?config, "Capturing from device");
    Ok((device, config))
}

/// Builds a paused input stream handing interleaved samples to `on_samples`.
/// Device errors are reported as [`CaptureEvent::Failed`].
pub(crate) fn build_input_stream<F>(
    device: &cpal::Device,
    config: cpal::SupportedStreamConfig,
    mut on_samples: F,
    callback: CaptureCallback,
) -> Result<cpal::Stream>
where
    F: FnMut(&[f32]) + Send + 'static,
{
    let err_fn = move |err: cpal::StreamError| {
        error!("an error occurred on input stream: {}", err);
        callback(CaptureEvent::Failed(err.to_string()));
    };

    let stream = match config.sample_format() {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config.into(),
            move |data: &[i16], _: &_| on_samples(&to_f32(data)),
            err_fn,
            None,
        )?,
        cpal::SampleFormat::I32 => device.build_input_stream(
            &config.into(),
            move |data: &[i32], _: &_| on_samples(&to_f32(data)),
            err_fn,
            None,
        )?,
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config.into(),
            move |data: &[f32], _: &_| on_samples(data),
            err_fn,
            None,
        )?,
        sample_format => {
            return Err(MediaError::SampleFormatNotSupported(format!(
                "{:?}",
                sample_format
            )));
        }
    };
    Ok(stream)
}

fn to_f32<T>(input: &[T]) -> Vec<f32>
where
    T: Sample,
    f32: FromSample<T>,
{
    input.iter().map(|&s| f32::from_sample(s)).collect()
}

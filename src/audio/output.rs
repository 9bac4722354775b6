//! Audio output using cpal
//!
//! Thin wrapper over the default output device, fixed to the pipeline
//! format (48 kHz, stereo, f32, interleaved). The render callback runs
//! on the device's real-time thread and is handed the whole interleaved
//! buffer to fill; it must never block or allocate.

use crate::audio::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use tracing::{error, info};

pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl AudioOutput {
    /// Open the default output device at the fixed stream format.
    ///
    /// Failure here is fatal for the engine; there is no degraded mode
    /// for a broadcast output.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("no default output device found".into()))?;

        let name = device.name().unwrap_or_else(|_| "unknown".into());
        info!("using audio device: {name}");

        let mut supported = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("failed to query device configs: {e}")))?;

        let config = supported
            .find(|c| {
                c.channels() as usize == OUTPUT_CHANNELS
                    && c.sample_format() == SampleFormat::F32
                    && c.min_sample_rate().0 <= OUTPUT_SAMPLE_RATE
                    && c.max_sample_rate().0 >= OUTPUT_SAMPLE_RATE
            })
            .map(|c| c.with_sample_rate(SampleRate(OUTPUT_SAMPLE_RATE)).config())
            .ok_or_else(|| {
                Error::AudioOutput(format!(
                    "device {name} does not support {OUTPUT_SAMPLE_RATE} Hz stereo f32"
                ))
            })?;

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    /// Connect the stream and start pulling from `render`.
    pub fn start<F>(&mut self, mut render: F) -> Result<()>
    where
        F: FnMut(&mut [f32]) + Send + 'static,
    {
        info!("starting audio stream");

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| render(data),
                |e| error!("audio stream error: {e}"),
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("failed to build stream: {e}")))?;

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("failed to start stream: {e}")))?;

        self.stream = Some(stream);
        Ok(())
    }

    /// Tear the stream down.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            info!("stopping audio stream");
            let _ = stream.pause();
            drop(stream);
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

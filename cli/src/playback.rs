//! Audio device output using cpal
//!
//! The synthesizer is moved into the device callback and runs on the audio thread for the
//! lifetime of the stream. It is built only after the device config is chosen, so it always
//! runs at the device's real sample rate.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedBufferSize, SupportedStreamConfig, SupportedStreamConfigRange};
use log::{debug, error, info, warn};
use tonecast_core::{ModemConfig, ModemError, OutputSample, Result, SymbolReceiver, Synthesizer};

use crate::output::Output;

/// Sample formats in order of preference (unsigned 16-bit is the native modem format)
const FORMAT_PREFERENCE: [SampleFormat; 3] = [SampleFormat::U16, SampleFormat::I16, SampleFormat::F32];

pub struct DevicePlayback {
    stream: cpal::Stream,
}

impl DevicePlayback {
    /// Open the default output device and start pulling symbols from `receiver`.
    ///
    /// Uses `config.sample_rate` when the device supports it, otherwise the device's default
    /// rate. Symbol timing is re-derived for whichever rate is used.
    pub fn start(config: &ModemConfig, receiver: SymbolReceiver) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| ModemError::DeviceUnavailable("no audio output device available".into()))?;

        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
        let supported = pick_output_config(&device, config.sample_rate)?;

        let device_rate = supported.sample_rate().0;
        let config = config.with_sample_rate(device_rate).map_err(|e| {
            ModemError::DeviceUnavailable(format!("device rate {} Hz is unusable: {}", device_rate, e))
        })?;
        let synth = Synthesizer::new(&config, receiver);

        let frames = config.callback_frames() as u32;
        let buffer_size = match supported.buffer_size() {
            SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&frames) => {
                cpal::BufferSize::Fixed(frames)
            }
            _ => {
                warn!(
                    "Device '{}' can't use a {}-frame buffer, using its default",
                    name, frames
                );
                cpal::BufferSize::Default
            }
        };

        let stream_config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size,
        };

        info!(
            "Opening '{}': {} Hz, {} channel(s), {:?}",
            name,
            stream_config.sample_rate.0,
            stream_config.channels,
            supported.sample_format()
        );

        let stream = match supported.sample_format() {
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, synth)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, synth)?,
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, synth)?,
            other => {
                return Err(ModemError::DeviceUnavailable(format!(
                    "unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| ModemError::DeviceUnavailable(format!("failed to start audio stream: {}", e)))?;

        debug!("Audio stream started");

        Ok(Self { stream })
    }
}

impl Output for DevicePlayback {
    fn finish(self: Box<Self>) -> Result<()> {
        if let Err(e) = self.stream.pause() {
            // Dropping the stream stops it anyway
            warn!("Failed to pause audio stream: {}", e);
        }
        debug!("Audio stream stopped");
        Ok(())
    }
}

/// One supported output range, reduced to what config selection looks at
#[derive(Debug, Clone, Copy, PartialEq)]
struct OutputRange {
    channels: u16,
    min_rate: u32,
    max_rate: u32,
    format: SampleFormat,
}

impl OutputRange {
    fn from_cpal(range: &SupportedStreamConfigRange) -> Self {
        Self {
            channels: range.channels(),
            min_rate: range.min_sample_rate().0,
            max_rate: range.max_sample_rate().0,
            format: range.sample_format(),
        }
    }

    fn supports(&self, sample_rate: u32) -> bool {
        self.min_rate <= sample_rate && sample_rate <= self.max_rate
    }
}

/// Best range for `sample_rate`: mono first, then the format order above
fn choose_range(ranges: &[OutputRange], sample_rate: u32) -> Option<usize> {
    for mono in [true, false] {
        for format in FORMAT_PREFERENCE {
            let found = ranges.iter().position(|range| {
                range.supports(sample_rate) && range.format == format && (range.channels == 1) == mono
            });
            if found.is_some() {
                return found;
            }
        }
    }
    None
}

/// Range index and rate to open: `requested` if any range takes it, else `fallback`
fn choose_config(ranges: &[OutputRange], requested: u32, fallback: Option<u32>) -> Option<(usize, u32)> {
    if let Some(index) = choose_range(ranges, requested) {
        return Some((index, requested));
    }
    let fallback = fallback.filter(|&rate| rate != requested)?;
    choose_range(ranges, fallback).map(|index| (index, fallback))
}

fn pick_output_config(device: &cpal::Device, sample_rate: u32) -> Result<SupportedStreamConfig> {
    let supported: Vec<SupportedStreamConfigRange> = device
        .supported_output_configs()
        .map_err(|e| ModemError::DeviceUnavailable(format!("failed to query output configs: {}", e)))?
        .collect();
    let ranges: Vec<OutputRange> = supported.iter().map(OutputRange::from_cpal).collect();

    let default_rate = match device.default_output_config() {
        Ok(default) => Some(default.sample_rate().0),
        Err(e) => {
            debug!("No default output config: {}", e);
            None
        }
    };

    let (index, rate) = choose_config(&ranges, sample_rate, default_rate).ok_or_else(|| {
        ModemError::DeviceUnavailable(format!(
            "no output config supports {} Hz (or the device default) in U16, I16 or F32",
            sample_rate
        ))
    })?;

    if rate != sample_rate {
        warn!(
            "Device doesn't support {} Hz, falling back to its default of {} Hz",
            sample_rate, rate
        );
    }

    Ok(supported[index].clone().with_sample_rate(cpal::SampleRate(rate)))
}

fn build_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut synth: Synthesizer,
) -> Result<cpal::Stream>
where
    T: OutputSample + cpal::SizedSample,
{
    let channels = stream_config.channels as usize;

    device
        .build_output_stream(
            stream_config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                synth.fill_frames(data, channels);
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| ModemError::DeviceUnavailable(format!("failed to build audio stream: {}", e)))
}

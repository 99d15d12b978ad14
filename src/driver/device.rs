//! CPAL output driver.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleRate, Stream, StreamConfig as CpalStreamConfig};

use crate::driver::OutputDriver;
use crate::format::{AudioFormat, SampleFormat};
use crate::{DeviceTarget, OutputBuffer, OutputError, RenderCallback};

/// Maps a device-native sample format onto CPAL's.
fn cpal_sample_format(format: SampleFormat) -> Option<cpal::SampleFormat> {
    match format {
        SampleFormat::S8 => Some(cpal::SampleFormat::I8),
        SampleFormat::S16 => Some(cpal::SampleFormat::I16),
        SampleFormat::S32 => Some(cpal::SampleFormat::I32),
        SampleFormat::S24P32 | SampleFormat::Float => None,
    }
}

/// An output device as seen by [`CpalDriver::list_devices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDeviceInfo {
    /// Name to use as the `device` option.
    pub name: String,
    /// Largest channel count of any supported integer output config.
    ///
    /// A `channel_map` for this device needs this many entries. `None` if
    /// the device reports no integer configs the sink can drive.
    pub max_channels: Option<usize>,
    /// Whether this is the host's default output device.
    pub is_default: bool,
}

/// Largest channel count among the supported configs a sink can open.
fn max_playable_channels(device: &Device) -> Option<usize> {
    device
        .supported_output_configs()
        .ok()?
        .filter(|range| {
            matches!(
                range.sample_format(),
                cpal::SampleFormat::I8 | cpal::SampleFormat::I16 | cpal::SampleFormat::I32
            )
        })
        .map(|range| usize::from(range.channels()))
        .max()
}

/// Output driver backed by CPAL's default host.
///
/// Frames reach the device interleaved in native byte order, so the
/// render callback is handed a single [`OutputBuffer`] spanning every
/// output channel.
#[must_use]
#[derive(Default)]
pub struct CpalDriver {
    device: Option<Device>,
    callback: Option<RenderCallback>,
    format: Option<(AudioFormat, cpal::SampleFormat)>,
    stream: Option<Stream>,
}

impl CpalDriver {
    /// Creates a driver with no device acquired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the acquired device, if any.
    pub fn device_name(&self) -> Option<String> {
        self.device.as_ref().and_then(|d| d.name().ok())
    }

    /// Lists the output devices of the default host with the channel
    /// counts a sink can drive on them.
    ///
    /// # Errors
    ///
    /// Returns a device error if the host cannot enumerate its devices.
    pub fn list_devices() -> Result<Vec<OutputDeviceInfo>, OutputError> {
        let host = cpal::default_host();
        let default = host.default_output_device().and_then(|d| d.name().ok());
        let devices = host
            .output_devices()
            .map_err(|e| OutputError::device(e.to_string()))?;

        Ok(devices
            .filter_map(|device| {
                let name = device.name().ok()?;
                Some(OutputDeviceInfo {
                    is_default: default.as_deref() == Some(name.as_str()),
                    max_channels: max_playable_channels(&device),
                    name,
                })
            })
            .collect())
    }

    fn find_output_device(host: &cpal::Host, name: &str) -> Result<Option<Device>, OutputError> {
        let devices = host
            .output_devices()
            .map_err(|e| OutputError::device(e.to_string()))?;

        for device in devices {
            if let Ok(device_name) = device.name() {
                if device_name == name {
                    return Ok(Some(device));
                }
            }
        }

        Ok(None)
    }

    fn build_stream(
        device: &Device,
        config: &CpalStreamConfig,
        sample_format: cpal::SampleFormat,
        callback: RenderCallback,
    ) -> Result<Stream, OutputError> {
        let channels = usize::from(config.channels);

        device
            .build_output_stream_raw(
                config,
                sample_format,
                move |data: &mut cpal::Data, _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    let mut buffers = [OutputBuffer::new(channels, data.bytes_mut())];
                    callback.render(frames, &mut buffers);
                },
                |err| {
                    tracing::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| OutputError::device(e.to_string()))
    }
}

impl OutputDriver for CpalDriver {
    fn name(&self) -> &str {
        "cpal"
    }

    fn acquire(&mut self, target: &DeviceTarget) -> Result<(), OutputError> {
        let host = cpal::default_host();

        let named = match target {
            DeviceTarget::Named(name) => {
                let found = Self::find_output_device(&host, name)?;
                if found.is_none() {
                    tracing::warn!(device = %name, "Output device not found, using default device");
                }
                found
            }
            // CPAL does not distinguish the system sound device.
            DeviceTarget::Default | DeviceTarget::System => None,
        };

        let device = match named {
            Some(device) => device,
            None => host
                .default_output_device()
                .ok_or_else(|| OutputError::device("no default output device"))?,
        };

        tracing::debug!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            target = %target,
            "Acquired output device"
        );
        self.device = Some(device);
        Ok(())
    }

    fn register_callback(&mut self, callback: RenderCallback) -> Result<(), OutputError> {
        if self.device.is_none() {
            return Err(OutputError::device("no device acquired"));
        }
        self.callback = Some(callback);
        Ok(())
    }

    fn configure(&mut self, format: &AudioFormat) -> Result<usize, OutputError> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| OutputError::device("no device acquired"))?;

        let sample_format = cpal_sample_format(format.format).ok_or_else(|| {
            OutputError::format_rejected(format!("{} is not a device sample format", format.format))
        })?;

        let ranges = device
            .supported_output_configs()
            .map_err(|e| OutputError::device(e.to_string()))?;

        let channels = ranges
            .filter(|range| {
                range.sample_format() == sample_format
                    && range.min_sample_rate().0 <= format.sample_rate
                    && format.sample_rate <= range.max_sample_rate().0
            })
            .map(|range| usize::from(range.channels()))
            .max()
            .ok_or_else(|| {
                OutputError::format_rejected(format!("device does not support {format}"))
            })?;

        self.format = Some((*format, sample_format));
        Ok(channels)
    }

    fn start(&mut self, output_channels: usize) -> Result<(), OutputError> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| OutputError::device("no device acquired"))?;
        let callback = self
            .callback
            .clone()
            .ok_or_else(|| OutputError::device("no render callback registered"))?;
        let (format, sample_format) = self
            .format
            .ok_or_else(|| OutputError::device("stream format not configured"))?;

        let channels = u16::try_from(output_channels)
            .map_err(|_| OutputError::device(format!("{output_channels} output channels")))?;

        let config = CpalStreamConfig {
            channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let stream = Self::build_stream(device, &config, sample_format, callback)?;
        stream
            .play()
            .map_err(|e| OutputError::device(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("Failed to pause output stream: {}", e);
            }
        }
        self.format = None;
    }

    fn unregister_callback(&mut self) {
        self.callback = None;
    }

    fn release(&mut self) {
        self.stop();
        self.callback = None;
        self.device = None;
    }
}

impl std::fmt::Debug for CpalDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalDriver")
            .field("device", &self.device_name())
            .field("running", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SinkShared;

    #[test]
    fn test_cpal_sample_format_mapping() {
        assert_eq!(cpal_sample_format(SampleFormat::S16), Some(cpal::SampleFormat::I16));
        assert_eq!(cpal_sample_format(SampleFormat::S32), Some(cpal::SampleFormat::I32));
        assert_eq!(cpal_sample_format(SampleFormat::Float), None);
    }

    #[test]
    fn test_configure_without_device_fails() {
        let mut driver = CpalDriver::new();
        let err = driver.configure(&AudioFormat::cd()).unwrap_err();
        assert!(err.is_device());
    }

    #[test]
    fn test_register_without_device_fails() {
        let mut driver = CpalDriver::new();
        let callback = RenderCallback::new(SinkShared::new());
        assert!(driver.register_callback(callback).is_err());
    }

    #[test]
    fn test_list_devices_marks_at_most_one_default() {
        // Headless machines may have no host devices at all.
        if let Ok(devices) = CpalDriver::list_devices() {
            assert!(devices.iter().filter(|d| d.is_default).count() <= 1);
        }
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_list_devices_reports_channels() {
        let devices = CpalDriver::list_devices().unwrap();
        let default = devices.iter().find(|d| d.is_default).unwrap();
        assert!(default.max_channels.unwrap_or(0) >= 1);
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_acquire_default_device() {
        let mut driver = CpalDriver::new();
        driver.acquire(&DeviceTarget::Default).unwrap();
        println!("Default device: {:?}", driver.device_name());
        let channels = driver.configure(&AudioFormat::cd()).unwrap();
        assert!(channels >= 1);
    }
}

//! Mock output driver for testing without hardware.

use crate::driver::OutputDriver;
use crate::format::AudioFormat;
use crate::{DeviceTarget, OutputBuffer, OutputError, RenderCallback};

/// A scripted output device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDevice {
    /// Device name matched against [`DeviceTarget::Named`].
    pub name: String,
    /// Output channels the device offers.
    pub channels: usize,
}

impl MockDevice {
    /// Creates a device description.
    pub fn new(name: impl Into<String>, channels: usize) -> Self {
        Self {
            name: name.into(),
            channels,
        }
    }
}

/// An output driver that never touches hardware.
///
/// The first scripted device is the default. Nothing pulls audio on its
/// own: tests play the driver's real-time thread by calling
/// [`pull`](Self::pull) or [`pull_planar`](Self::pull_planar) while the
/// stream is running.
///
/// # Example
///
/// ```
/// use stream_output::driver::{MockDevice, MockDriver};
///
/// let driver = MockDriver::new()
///     .with_device(MockDevice::new("Surround", 6))
///     .fail_start();
///
/// assert_eq!(driver.devices().len(), 2);
/// assert!(driver.pull(256).is_none());
/// ```
#[must_use]
#[derive(Debug)]
pub struct MockDriver {
    devices: Vec<MockDevice>,
    acquired: Option<usize>,
    callback: Option<RenderCallback>,
    format: Option<AudioFormat>,
    output_channels: Option<usize>,
    fail_acquire: bool,
    fail_register: bool,
    reject_format: bool,
    fail_start: bool,
    stop_count: usize,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Creates a driver with a single stereo default device.
    pub fn new() -> Self {
        Self::with_devices(vec![MockDevice::new("Mock Output", 2)])
    }

    /// Creates a driver with the given devices, the first being the default.
    pub fn with_devices(devices: Vec<MockDevice>) -> Self {
        Self {
            devices,
            acquired: None,
            callback: None,
            format: None,
            output_channels: None,
            fail_acquire: false,
            fail_register: false,
            reject_format: false,
            fail_start: false,
            stop_count: 0,
        }
    }

    /// Adds another device.
    pub fn with_device(mut self, device: MockDevice) -> Self {
        self.devices.push(device);
        self
    }

    /// Makes device discovery fail.
    pub fn fail_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    /// Makes callback registration fail.
    pub fn fail_register(mut self) -> Self {
        self.fail_register = true;
        self
    }

    /// Makes the device reject every stream format.
    pub fn reject_format(mut self) -> Self {
        self.reject_format = true;
        self
    }

    /// Makes starting the stream fail.
    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// The scripted devices.
    pub fn devices(&self) -> &[MockDevice] {
        &self.devices
    }

    /// The device currently acquired, if any.
    pub fn acquired_device(&self) -> Option<&MockDevice> {
        self.acquired.and_then(|index| self.devices.get(index))
    }

    /// Whether a render callback is registered.
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// A handle to the registered render callback.
    pub fn callback(&self) -> Option<RenderCallback> {
        self.callback.clone()
    }

    /// Format accepted by the last successful `configure`.
    pub fn configured_format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Whether the stream is running.
    pub fn is_running(&self) -> bool {
        self.output_channels.is_some()
    }

    /// Channels per frame of the running stream.
    pub fn output_channels(&self) -> Option<usize> {
        self.output_channels
    }

    /// How many times `stop` has been called.
    pub fn stop_count(&self) -> usize {
        self.stop_count
    }

    /// Pulls `frames` interleaved frames the way a real driver would.
    ///
    /// Returns the number of frames rendered from buffered audio along
    /// with the destination bytes, or `None` if the stream is not running.
    pub fn pull(&self, frames: usize) -> Option<(usize, Vec<u8>)> {
        let (callback, channels, sample_size) = self.running()?;

        let mut data = vec![0u8; frames * channels * sample_size];
        let rendered = callback.render(frames, &mut [OutputBuffer::new(channels, &mut data)]);
        Some((rendered, data))
    }

    /// Pulls `frames` frames into one buffer per output channel.
    pub fn pull_planar(&self, frames: usize) -> Option<(usize, Vec<Vec<u8>>)> {
        let (callback, channels, sample_size) = self.running()?;

        let mut planes = vec![vec![0u8; frames * sample_size]; channels];
        let mut buffers: Vec<_> = planes
            .iter_mut()
            .map(|plane| OutputBuffer::new(1, plane))
            .collect();
        let rendered = callback.render(frames, &mut buffers);
        drop(buffers);
        Some((rendered, planes))
    }

    fn running(&self) -> Option<(&RenderCallback, usize, usize)> {
        let callback = self.callback.as_ref()?;
        let channels = self.output_channels?;
        let format = self.format?;
        Some((callback, channels, format.sample_size()))
    }
}

impl OutputDriver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    fn acquire(&mut self, target: &DeviceTarget) -> Result<(), OutputError> {
        if self.fail_acquire || self.devices.is_empty() {
            return Err(OutputError::device("no output devices"));
        }

        let index = match target {
            DeviceTarget::Named(name) => {
                let found = self.devices.iter().position(|d| &d.name == name);
                if found.is_none() {
                    tracing::warn!(device = %name, "Output device not found, using default device");
                }
                found.unwrap_or(0)
            }
            DeviceTarget::Default | DeviceTarget::System => 0,
        };

        tracing::debug!(device = %self.devices[index].name, target = %target, "Acquired output device");
        self.acquired = Some(index);
        Ok(())
    }

    fn register_callback(&mut self, callback: RenderCallback) -> Result<(), OutputError> {
        if self.fail_register {
            return Err(OutputError::device("callback registration refused"));
        }
        self.callback = Some(callback);
        Ok(())
    }

    fn configure(&mut self, format: &AudioFormat) -> Result<usize, OutputError> {
        let device = self
            .acquired_device()
            .ok_or_else(|| OutputError::device("no device acquired"))?;

        if self.reject_format || !format.format.is_device_native() {
            return Err(OutputError::format_rejected(format!(
                "{} does not support {format}",
                device.name
            )));
        }

        let channels = device.channels;
        self.format = Some(*format);
        Ok(channels)
    }

    fn start(&mut self, output_channels: usize) -> Result<(), OutputError> {
        if self.fail_start {
            return Err(OutputError::device("stream failed to start"));
        }
        if self.callback.is_none() || self.format.is_none() {
            return Err(OutputError::device("stream not configured"));
        }
        self.output_channels = Some(output_channels);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop_count += 1;
        self.output_channels = None;
        self.format = None;
    }

    fn unregister_callback(&mut self) {
        self.callback = None;
    }

    fn release(&mut self) {
        self.output_channels = None;
        self.format = None;
        self.acquired = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SampleFormat;
    use crate::pipeline::SinkShared;

    fn callback() -> RenderCallback {
        RenderCallback::new(SinkShared::new())
    }

    #[test]
    fn test_acquire_named_device() {
        let mut driver = MockDriver::new().with_device(MockDevice::new("USB DAC", 4));
        driver
            .acquire(&DeviceTarget::Named("USB DAC".to_string()))
            .unwrap();
        assert_eq!(driver.acquired_device().unwrap().channels, 4);
    }

    #[test]
    fn test_acquire_unknown_device_falls_back_to_default() {
        let mut driver = MockDriver::new().with_device(MockDevice::new("USB DAC", 4));
        driver
            .acquire(&DeviceTarget::Named("Missing".to_string()))
            .unwrap();
        assert_eq!(driver.acquired_device().unwrap().name, "Mock Output");
    }

    #[test]
    fn test_acquire_without_devices_fails() {
        let mut driver = MockDriver::with_devices(Vec::new());
        assert!(driver.acquire(&DeviceTarget::Default).unwrap_err().is_device());
    }

    #[test]
    fn test_configure_reports_device_channels() {
        let mut driver = MockDriver::new();
        driver.acquire(&DeviceTarget::System).unwrap();
        let channels = driver
            .configure(&AudioFormat::new(48000, 2, SampleFormat::S16))
            .unwrap();
        assert_eq!(channels, 2);
    }

    #[test]
    fn test_configure_rejects_non_native_depth() {
        let mut driver = MockDriver::new();
        driver.acquire(&DeviceTarget::Default).unwrap();
        let err = driver
            .configure(&AudioFormat::new(48000, 2, SampleFormat::Float))
            .unwrap_err();
        assert!(matches!(err, OutputError::FormatRejected { .. }));
    }

    #[test]
    fn test_pull_requires_running_stream() {
        let mut driver = MockDriver::new();
        driver.acquire(&DeviceTarget::Default).unwrap();
        driver.register_callback(callback()).unwrap();
        assert!(driver.pull(16).is_none());

        driver.configure(&AudioFormat::cd()).unwrap();
        driver.start(2).unwrap();
        let (rendered, data) = driver.pull(16).unwrap();
        assert_eq!(rendered, 0);
        assert_eq!(data.len(), 16 * 2 * 2);

        driver.stop();
        assert!(driver.pull(16).is_none());
        assert_eq!(driver.stop_count(), 1);
    }

    #[test]
    fn test_pull_planar_shapes_buffers() {
        let mut driver = MockDriver::new();
        driver.acquire(&DeviceTarget::Default).unwrap();
        driver.register_callback(callback()).unwrap();
        driver.configure(&AudioFormat::cd()).unwrap();
        driver.start(2).unwrap();

        let (_, planes) = driver.pull_planar(8).unwrap();
        assert_eq!(planes.len(), 2);
        assert!(planes.iter().all(|plane| plane.len() == 16));
    }
}

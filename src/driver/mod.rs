//! Audio driver abstraction.
//!
//! An [`OutputDriver`] is the per-sink handle onto the native audio API.
//! It owns the device, the registered [`RenderCallback`] and the running
//! stream. Two implementations ship with the crate:
//!
//! - [`CpalDriver`]: plays through CPAL's default host
//! - [`MockDriver`]: hardware-free driver for tests, pulled by hand
//!
//! [`CpalDriver::list_devices`] reports what a `device` option can name
//! and how many channels a `channel_map` for it needs.

mod device;
mod mock;

pub use device::{CpalDriver, OutputDeviceInfo};
pub use mock::{MockDevice, MockDriver};

use crate::format::AudioFormat;
use crate::{DeviceTarget, OutputError, RenderCallback};

/// Contract between an [`AudioSink`](crate::AudioSink) and the native
/// audio API.
///
/// The sink calls these in lifecycle order:
///
/// ```text
/// enable:  acquire → register_callback
/// open:    configure → start
/// close:   stop
/// disable: unregister_callback → release
/// ```
///
/// Once `start` succeeds the driver invokes the registered callback from
/// its own real-time thread until `stop` returns. Teardown methods are
/// infallible and must tolerate being called when there is nothing to
/// tear down.
pub trait OutputDriver {
    /// Name of the backend for log messages.
    fn name(&self) -> &str;

    /// Resolves and opens the target device.
    fn acquire(&mut self, target: &DeviceTarget) -> Result<(), OutputError>;

    /// Registers the callback the driver will pull audio through.
    fn register_callback(&mut self, callback: RenderCallback) -> Result<(), OutputError>;

    /// Checks that the device accepts `format` and returns the number of
    /// device output channels available for it.
    fn configure(&mut self, format: &AudioFormat) -> Result<usize, OutputError>;

    /// Starts the stream with `output_channels` device channels per frame.
    fn start(&mut self, output_channels: usize) -> Result<(), OutputError>;

    /// Stops the stream. The callback is not invoked after this returns.
    fn stop(&mut self);

    /// Drops the registered callback.
    fn unregister_callback(&mut self);

    /// Releases the device.
    fn release(&mut self);
}

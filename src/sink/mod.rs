//! The output sink and its lifecycle.
//!
//! An [`AudioSink`] moves through these states:
//!
//! ```text
//! Created ──enable──▶ Enabled ──open──▶ Open
//!    ▲                  │ ▲               │
//!    └─────disable──────┘ └─────close─────┘
//! ```
//!
//! `Closed` and `Disabled` are the states reached through `close` and
//! `disable`; they accept the same operations as `Enabled` and `Created`.
//! `finish` ends the sink for good.

use std::fmt;
use std::sync::Arc;

use crate::driver::OutputDriver;
use crate::format::AudioFormat;
use crate::pipeline::{ChannelRouter, ChannelRoutingTable, Playback, RingBuffer, SinkShared};
use crate::{ConfigBlock, OutputConfig, OutputError, RenderCallback, SinkStats};

/// Lifecycle state of an [`AudioSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkState {
    /// Configured, no device held.
    Created,
    /// Device acquired and render callback registered.
    Enabled,
    /// Stream running; `write` and `cancel` are allowed.
    Open,
    /// Stream closed; behaves like `Enabled`.
    Closed,
    /// Device released; behaves like `Created`.
    Disabled,
    /// Torn down for good.
    Finished,
}

impl SinkState {
    /// Returns `true` if the sink holds a device but no stream.
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled | Self::Closed)
    }

    /// Returns `true` if the sink holds no device.
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Created | Self::Disabled)
    }
}

impl fmt::Display for SinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Enabled => "enabled",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Disabled => "disabled",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// An audio output fed by a player thread and drained by a driver.
///
/// The player pushes interleaved PCM with [`write`](Self::write), which
/// blocks while the one-second ring buffer is full. The driver pulls
/// frames through the [`RenderCallback`] registered at
/// [`enable`](Self::enable), de-interleaved through the output's channel
/// routing. `write`, `cancel` and `abort` take `&self` so they can be
/// called from other threads while the sink is shared.
///
/// # Example
///
/// ```
/// use stream_output::{AudioSink, OutputConfig};
/// use stream_output::driver::MockDriver;
/// use stream_output::format::{AudioFormat, SampleFormat};
///
/// let mut sink = AudioSink::new(OutputConfig::default(), MockDriver::new());
/// sink.enable()?;
///
/// let mut format = AudioFormat::new(44100, 2, SampleFormat::S16);
/// sink.open(&mut format)?;
/// sink.write_all(&[0u8; 4 * 441])?;
///
/// let (rendered, _) = sink.driver().pull(441).unwrap();
/// assert_eq!(rendered, 441);
///
/// sink.close()?;
/// sink.disable()?;
/// sink.finish()?;
/// # Ok::<(), stream_output::OutputError>(())
/// ```
pub struct AudioSink<D: OutputDriver> {
    config: OutputConfig,
    router: ChannelRouter,
    driver: D,
    shared: Arc<SinkShared>,
    state: SinkState,
    format: Option<AudioFormat>,
}

impl<D: OutputDriver> AudioSink<D> {
    /// Creates a sink in the `Created` state.
    pub fn new(config: OutputConfig, driver: D) -> Self {
        let router = ChannelRouter::new(config.routing.clone());
        Self {
            config,
            router,
            driver,
            shared: SinkShared::new(),
            state: SinkState::Created,
            format: None,
        }
    }

    /// Creates a sink from a configuration block.
    ///
    /// Options the sink does not understand are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Config`] if the block's options are invalid.
    pub fn from_block(block: &ConfigBlock, driver: D) -> Result<Self, OutputError> {
        let config = OutputConfig::from_block(block)?;

        for param in block.unused_params() {
            tracing::warn!(
                output = %config.name,
                option = %param.name,
                line = param.line,
                "Ignoring unknown output option"
            );
        }

        Ok(Self::new(config, driver))
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SinkState {
        self.state
    }

    /// The output name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The output configuration.
    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// The negotiated format while the sink is open.
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// The routing table in use while the sink is open.
    pub fn routing_table(&self) -> Option<ChannelRoutingTable> {
        self.shared.routing_table()
    }

    /// Bytes written but not yet rendered.
    pub fn buffered_bytes(&self) -> usize {
        self.shared.buffered_bytes()
    }

    /// Playback counters accumulated over the sink's lifetime.
    pub fn stats(&self) -> SinkStats {
        self.shared.stats()
    }

    /// The driver this sink plays through.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    fn invalid_state(&self, operation: &'static str) -> OutputError {
        OutputError::InvalidState {
            operation,
            state: self.state,
        }
    }

    fn transition(&mut self, to: SinkState) {
        tracing::debug!(output = %self.config.name, from = %self.state, to = %to, "Sink state change");
        self.state = to;
    }

    /// Acquires the device and registers the render callback.
    ///
    /// # Errors
    ///
    /// Returns a device error if the device cannot be found or the
    /// callback is refused; the sink stays in its current state.
    pub fn enable(&mut self) -> Result<(), OutputError> {
        if !self.state.is_idle() {
            return Err(self.invalid_state("enable"));
        }

        self.driver.acquire(&self.config.device)?;

        let callback = RenderCallback::new(Arc::clone(&self.shared));
        if let Err(e) = self.driver.register_callback(callback) {
            self.driver.release();
            return Err(e);
        }

        self.transition(SinkState::Enabled);
        Ok(())
    }

    /// Unregisters the render callback and releases the device.
    pub fn disable(&mut self) -> Result<(), OutputError> {
        if !self.state.is_enabled() {
            return Err(self.invalid_state("disable"));
        }

        self.release_device();
        Ok(())
    }

    /// Opens a stream for `format` and starts the driver.
    ///
    /// Sample formats the device cannot play natively are coerced to
    /// 32-bit; `format` is updated so the caller encodes what the device
    /// expects. The ring buffer holds one second of audio.
    ///
    /// # Errors
    ///
    /// Returns a device error if the format is rejected or the stream
    /// fails to start, or a configuration error if the channel routing
    /// does not fit the device. The sink stays enabled in either case.
    pub fn open(&mut self, format: &mut AudioFormat) -> Result<(), OutputError> {
        if !self.state.is_enabled() {
            return Err(self.invalid_state("open"));
        }

        if !format.is_valid() {
            return Err(OutputError::format_rejected(format!("invalid format {format}")));
        }

        let requested = format.format;
        if format.negotiate() {
            tracing::warn!(
                output = %self.config.name,
                requested = %requested,
                using = %format.format,
                "Sample format not supported by device, converting"
            );
        }

        let device_channels = match self.driver.configure(format) {
            Ok(channels) => channels,
            Err(e) => {
                self.driver.stop();
                return Err(e);
            }
        };

        let table = match self.router.build(usize::from(format.channels), device_channels) {
            Ok(table) => table,
            Err(e) => {
                self.driver.stop();
                return Err(e.into());
            }
        };
        tracing::debug!(output = %self.config.name, table = %table, "Channel routing");

        let unrouted = table.unrouted_sources();
        if !unrouted.is_empty() {
            tracing::warn!(
                output = %self.config.name,
                channels = ?unrouted,
                "Source channels are not routed to any device channel"
            );
        }

        let buffer_size = format.bytes_per_second().ok_or(OutputError::Allocation {
            bytes: usize::MAX,
        });
        let ring = match buffer_size.and_then(RingBuffer::new) {
            Ok(ring) => ring,
            Err(e) => {
                self.driver.stop();
                return Err(e);
            }
        };
        let buffer_size = ring.capacity();

        let output_channels = table.len();
        self.shared
            .install(Playback::new(ring, table, format.sample_size()));

        if let Err(e) = self.driver.start(output_channels) {
            self.shared.uninstall();
            self.driver.stop();
            return Err(e);
        }

        tracing::info!(
            output = %self.config.name,
            driver = self.driver.name(),
            sample_rate = format.sample_rate,
            channels = format.channels,
            bits = format.format.bits(),
            device_channels,
            output_channels,
            buffer_size,
            "Opened output stream"
        );

        self.format = Some(*format);
        self.transition(SinkState::Open);
        Ok(())
    }

    /// Stops the stream and drops the ring buffer.
    ///
    /// Writers still blocked in [`write`](Self::write) return
    /// [`OutputError::Aborted`].
    pub fn close(&mut self) -> Result<(), OutputError> {
        if self.state != SinkState::Open {
            return Err(self.invalid_state("close"));
        }

        self.close_stream();
        Ok(())
    }

    /// Writes as much of `data` as fits, blocking while the buffer is full.
    ///
    /// Returns the number of bytes accepted. Partial writes are normal;
    /// the caller retries with the remainder.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::InvalidState`] unless the sink is open, and
    /// [`OutputError::Aborted`] if [`abort`](Self::abort) was called while
    /// waiting.
    pub fn write(&self, data: &[u8]) -> Result<usize, OutputError> {
        if self.state != SinkState::Open {
            return Err(self.invalid_state("write"));
        }
        self.shared.write(data)
    }

    /// Writes all of `data`, blocking as needed.
    pub fn write_all(&self, mut data: &[u8]) -> Result<(), OutputError> {
        while !data.is_empty() {
            let written = self.write(data)?;
            data = &data[written..];
        }
        Ok(())
    }

    /// Discards buffered audio without stopping the stream.
    pub fn cancel(&self) -> Result<(), OutputError> {
        if self.state != SinkState::Open {
            return Err(self.invalid_state("cancel"));
        }
        self.shared.cancel();
        Ok(())
    }

    /// Makes every writer blocked in [`write`](Self::write) return
    /// [`OutputError::Aborted`].
    ///
    /// Writes started afterwards behave normally.
    pub fn abort(&self) {
        self.shared.abort();
    }

    /// Ends the sink. Only valid once the device has been released.
    pub fn finish(&mut self) -> Result<(), OutputError> {
        if !self.state.is_idle() {
            return Err(self.invalid_state("finish"));
        }
        self.transition(SinkState::Finished);
        Ok(())
    }

    fn close_stream(&mut self) {
        self.driver.stop();
        self.shared.uninstall();
        self.format = None;

        let stats = self.shared.stats();
        tracing::debug!(
            output = %self.config.name,
            frames_rendered = stats.frames_rendered,
            silent_frames = stats.silent_frames,
            underruns = stats.underruns,
            "Closed output stream"
        );
        self.transition(SinkState::Closed);
    }

    fn release_device(&mut self) {
        self.driver.unregister_callback();
        self.driver.release();
        self.transition(SinkState::Disabled);
    }
}

impl<D: OutputDriver> Drop for AudioSink<D> {
    fn drop(&mut self) {
        if self.state == SinkState::Open {
            self.close_stream();
        }
        if self.state.is_enabled() {
            self.release_device();
        }
    }
}

impl<D: OutputDriver + fmt::Debug> fmt::Debug for AudioSink<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSink")
            .field("name", &self.config.name)
            .field("state", &self.state)
            .field("format", &self.format)
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

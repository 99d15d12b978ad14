//! # stream-output
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Real-time audio output sink for a network-controlled playback daemon.
//!
//! `stream-output` sits between a player thread that produces PCM at its
//! own pace and an audio driver that pulls fixed-size buffers on a
//! real-time thread it owns. It provides a one-second ring buffer with
//! blocking writes, configurable channel routing onto the device's
//! channels, and a render callback that never blocks and masks
//! underruns with silence.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stream_output::{AudioSink, ChannelRouting, DeviceTarget, OutputConfig};
//! use stream_output::driver::CpalDriver;
//! use stream_output::format::{AudioFormat, SampleFormat};
//!
//! let config = OutputConfig::new("living room")
//!     .with_device(DeviceTarget::Named("USB DAC".into()))
//!     .with_routing(ChannelRouting::Stereo { left: 2, right: 3 });
//!
//! let mut sink = AudioSink::new(config, CpalDriver::new());
//! sink.enable()?;
//!
//! // The format may be coerced to a depth the device plays natively.
//! let mut format = AudioFormat::new(44100, 2, SampleFormat::S16);
//! sink.open(&mut format)?;
//!
//! # let pcm: Vec<u8> = Vec::new();
//! // Blocks while the buffer is full
//! sink.write_all(&pcm)?;
//!
//! sink.close()?;
//! sink.disable()?;
//! # Ok::<(), stream_output::OutputError>(())
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Player Thread**: calls `write`, which blocks while the buffer is full
//! - **Ring Buffer**: one mutex-protected byte FIFO per sink
//! - **Driver Thread**: calls the render callback, which only copies
//!   memory inside a short critical section and never fails
//!
//! Each sink owns its driver handle, so several sinks can coexist and be
//! tested in isolation with [`driver::MockDriver`].

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod config;
pub mod driver;
mod error;
pub mod format;
mod pipeline;
mod sink;
pub mod source;
mod stats;

pub use config::{
    BlockParam, ChannelRouting, ConfigBlock, DeviceTarget, OutputConfig, CHANNEL_MAP, DEVICE,
    OUTPUT_LEFT, OUTPUT_RIGHT,
};
pub use error::{ConfigError, OutputError};
pub use pipeline::{ChannelRouter, ChannelRoutingTable, OutputBuffer, RenderCallback, Route, RingBuffer};
pub use sink::{AudioSink, SinkState};
pub use stats::SinkStats;

//! Error types for stream-output.
//!
//! Errors are split into two categories:
//! - **Configuration errors** ([`ConfigError`]): malformed or out-of-range
//!   output options, reported when the sink is configured or opened
//! - **Output errors** ([`OutputError`]): everything a sink operation can
//!   return, including device failures and lifecycle misuse
//!
//! Buffer underruns are not errors. They are masked with silence by the
//! render callback and only show up in [`SinkStats`](crate::SinkStats).

use crate::SinkState;

/// A malformed or out-of-range output configuration.
///
/// The sink stays usable after a configuration error: it remains in the
/// state it was in before the failing call, so the operator can fix the
/// configuration and retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The channel map has more entries than the device has channels.
    #[error("channel_map contains more than {expected} entries")]
    TooManyEntries {
        /// Number of device channels.
        expected: usize,
    },

    /// The channel map has fewer entries than the device has channels.
    #[error("channel_map contains {found} entries, device has {expected} channels")]
    TooFewEntries {
        /// Number of device channels.
        expected: usize,
        /// Number of entries that were parsed.
        found: usize,
    },

    /// The channel map contains a character outside the grammar.
    #[error("invalid character {character:?} at offset {offset} in channel_map")]
    InvalidCharacter {
        /// The offending character.
        character: char,
        /// Byte offset of the character in the map string.
        offset: usize,
    },

    /// A channel map value is below the mute sentinel.
    #[error("channel_map value {value} not allowed (must be -1 or greater)")]
    ValueBelowMute {
        /// The rejected value.
        value: i64,
    },

    /// A channel map value names a source channel that does not exist.
    #[error("channel_map value {value} out of range for {channels} source channels")]
    SourceChannelOutOfRange {
        /// The rejected source channel index.
        value: usize,
        /// Number of channels in the source stream.
        channels: usize,
    },

    /// `output_left` or `output_right` names a device channel that does not exist.
    #[error("{option} = {value} out of range for {channels} device channels")]
    DeviceChannelOutOfRange {
        /// Name of the option (`output_left` or `output_right`).
        option: &'static str,
        /// The rejected device channel index.
        value: usize,
        /// Number of device channels.
        channels: usize,
    },

    /// `output_left` and `output_right` select the same device channel.
    #[error("output_left and output_right both select device channel {channel}")]
    DuplicateOutputChannel {
        /// The device channel named twice.
        channel: usize,
    },

    /// `channel_map` was combined with `output_left`/`output_right`.
    #[error("channel_map cannot be combined with output_left/output_right")]
    ConflictingRouting,

    /// One option of a required pair is missing.
    #[error("{present} is set but {missing} is missing")]
    MissingOption {
        /// The option that was given.
        present: &'static str,
        /// The option that must accompany it.
        missing: &'static str,
    },

    /// An option value is not a valid number.
    #[error("not a valid number for {name} in line {line}: {value:?}")]
    InvalidNumber {
        /// Option name.
        name: String,
        /// The raw option value.
        value: String,
        /// Configuration line the option came from.
        line: u32,
    },
}

/// Errors returned by [`AudioSink`](crate::AudioSink) operations.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// The routing or option configuration is invalid.
    #[error("invalid output configuration: {0}")]
    Config(#[from] ConfigError),

    /// The driver could not find, open or drive the device.
    #[error("audio device error: {reason}")]
    Device {
        /// Description of what went wrong.
        reason: String,
    },

    /// The device did not accept the requested stream format.
    #[error("format not accepted by device: {reason}")]
    FormatRejected {
        /// Description of the rejected format.
        reason: String,
    },

    /// The sample buffer could not be allocated.
    #[error("cannot allocate a {bytes} byte sample buffer")]
    Allocation {
        /// Requested size in bytes (saturated on overflow).
        bytes: usize,
    },

    /// An operation was invoked in the wrong lifecycle state.
    ///
    /// This is a programming error in the caller, not a runtime condition.
    #[error("{operation} is not allowed while the sink is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the sink was in.
        state: SinkState,
    },

    /// A blocked write was abandoned through [`AudioSink::abort`](crate::AudioSink::abort).
    #[error("write aborted")]
    Aborted,
}

impl OutputError {
    /// Creates a device error with the given reason.
    pub fn device(reason: impl Into<String>) -> Self {
        Self::Device {
            reason: reason.into(),
        }
    }

    /// Creates a format rejection with the given reason.
    pub fn format_rejected(reason: impl Into<String>) -> Self {
        Self::FormatRejected {
            reason: reason.into(),
        }
    }

    /// Returns `true` for configuration errors.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns `true` for device-class errors (device, format, allocation).
    pub fn is_device(&self) -> bool {
        matches!(
            self,
            Self::Device { .. } | Self::FormatRejected { .. } | Self::Allocation { .. }
        )
    }

    /// Returns `true` for lifecycle misuse.
    pub fn is_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}

//! Output configuration.
//!
//! An output is described by a [`ConfigBlock`], a flat list of
//! `name value` options handed over by the daemon's configuration layer.
//! [`OutputConfig::from_block`] extracts the options this sink
//! understands:
//!
//! | Option | Meaning |
//! |---|---|
//! | `name` | Output name used in log messages |
//! | `device` | `default`, `system`, or the name of a device |
//! | `channel_map` | Colon-separated source channel per device channel, `-1` mutes |
//! | `output_left`, `output_right` | Device channels carrying the stereo pair |

use std::cell::Cell;
use std::fmt;

use crate::ConfigError;

/// Option selecting the output device.
pub const DEVICE: &str = "device";
/// Option holding an explicit channel map.
pub const CHANNEL_MAP: &str = "channel_map";
/// Option naming the device channel that carries the left signal.
pub const OUTPUT_LEFT: &str = "output_left";
/// Option naming the device channel that carries the right signal.
pub const OUTPUT_RIGHT: &str = "output_right";

/// One `name value` option from a configuration block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockParam {
    /// Option name.
    pub name: String,
    /// Raw option value.
    pub value: String,
    /// Line the option was read from.
    pub line: u32,
    used: Cell<bool>,
}

impl BlockParam {
    /// Creates an option.
    pub fn new(name: impl Into<String>, value: impl Into<String>, line: u32) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            line,
            used: Cell::new(false),
        }
    }

    /// Returns `true` once the option has been looked up.
    pub fn is_used(&self) -> bool {
        self.used.get()
    }

    /// Parses the value as an unsigned integer.
    ///
    /// Follows C `strtoul` with base 0: a `0x` prefix selects hex, a
    /// leading `0` selects octal, anything else is decimal. The whole
    /// value must be consumed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidNumber`] for empty, negative or
    /// non-numeric values.
    pub fn unsigned_value(&self) -> Result<u32, ConfigError> {
        parse_unsigned(&self.value).ok_or_else(|| ConfigError::InvalidNumber {
            name: self.name.clone(),
            value: self.value.clone(),
            line: self.line,
        })
    }
}

fn parse_unsigned(value: &str) -> Option<u32> {
    let value = value.trim_start();
    let value = value.strip_prefix('+').unwrap_or(value);

    let (digits, radix) = if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        (hex, 16)
    } else if value.len() > 1 && value.starts_with('0') {
        (&value[1..], 8)
    } else {
        (value, 10)
    };

    // from_str_radix would accept another sign here
    if digits.is_empty() || !digits.starts_with(|c: char| c.is_digit(radix)) {
        return None;
    }
    u32::from_str_radix(digits, radix).ok()
}

/// A block of output options.
///
/// # Example
///
/// ```
/// use stream_output::ConfigBlock;
///
/// let block = ConfigBlock::new()
///     .with_param("device", "USB DAC", 3)
///     .with_param("channel_map", "0:1:-1:-1", 4);
///
/// assert_eq!(block.get_str("device"), Some("USB DAC"));
/// assert!(block.get_str("mixer_type").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigBlock {
    params: Vec<BlockParam>,
    line: u32,
}

impl ConfigBlock {
    /// Creates an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty block starting at the given configuration line.
    pub fn at_line(line: u32) -> Self {
        Self {
            params: Vec::new(),
            line,
        }
    }

    /// Adds an option.
    pub fn add_param(&mut self, name: impl Into<String>, value: impl Into<String>, line: u32) {
        self.params.push(BlockParam::new(name, value, line));
    }

    /// Adds an option, builder style.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>, line: u32) -> Self {
        self.add_param(name, value, line);
        self
    }

    /// Line the block starts at.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Looks up an option and marks it as used.
    pub fn get_param(&self, name: &str) -> Option<&BlockParam> {
        let param = self.params.iter().find(|param| param.name == name)?;
        param.used.set(true);
        Some(param)
    }

    /// Returns the raw value of an option.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get_param(name).map(|param| param.value.as_str())
    }

    /// Returns an option parsed as an unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidNumber`] if the option is present
    /// but not a valid number.
    pub fn get_unsigned(&self, name: &str) -> Result<Option<u32>, ConfigError> {
        self.get_param(name)
            .map(BlockParam::unsigned_value)
            .transpose()
    }

    /// Options nobody has looked up yet.
    pub fn unused_params(&self) -> impl Iterator<Item = &BlockParam> {
        self.params.iter().filter(|param| !param.is_used())
    }
}

/// Which device an output plays on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DeviceTarget {
    /// The user's default output device.
    #[default]
    Default,
    /// The device used for system sounds.
    System,
    /// A device looked up by name.
    Named(String),
}

impl DeviceTarget {
    /// Interprets the value of the `device` option.
    pub fn from_option(value: Option<&str>) -> Self {
        match value {
            None | Some("default") => Self::Default,
            Some("system") => Self::System,
            Some(name) => Self::Named(name.to_string()),
        }
    }

    /// Name used in log messages.
    pub fn name(&self) -> &str {
        match self {
            Self::Default => "default",
            Self::System => "system",
            Self::Named(name) => name,
        }
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Routing options as configured, before validation against a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ChannelRouting {
    /// Device channel `i` plays source channel `i`.
    #[default]
    Identity,
    /// Explicit `channel_map` string.
    Map(String),
    /// Stereo pair placed on two device channels.
    Stereo {
        /// Device channel for the left signal.
        left: usize,
        /// Device channel for the right signal.
        right: usize,
    },
}

/// Configuration of one output sink.
///
/// Use [`OutputConfig::default()`] for the default device without
/// routing, or [`OutputConfig::from_block`] to read a configuration block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Output name used in log messages.
    ///
    /// Default: `"default"`
    pub name: String,

    /// Device the output plays on.
    ///
    /// Default: [`DeviceTarget::Default`]
    pub device: DeviceTarget,

    /// Channel routing options.
    ///
    /// Default: [`ChannelRouting::Identity`]
    pub routing: ChannelRouting,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            device: DeviceTarget::Default,
            routing: ChannelRouting::Identity,
        }
    }
}

impl OutputConfig {
    /// Creates a configuration for the named output.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the target device.
    #[must_use]
    pub fn with_device(mut self, device: DeviceTarget) -> Self {
        self.device = device;
        self
    }

    /// Sets the channel routing.
    #[must_use]
    pub fn with_routing(mut self, routing: ChannelRouting) -> Self {
        self.routing = routing;
        self
    }

    /// Reads the output options from a configuration block.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `channel_map` is combined with
    /// `output_left`/`output_right`, if only one of the pair is given, or
    /// if either is not a number.
    pub fn from_block(block: &ConfigBlock) -> Result<Self, ConfigError> {
        let name = block.get_str("name").unwrap_or("default").to_string();
        let device = DeviceTarget::from_option(block.get_str(DEVICE));

        let map = block.get_str(CHANNEL_MAP);
        let left = block.get_unsigned(OUTPUT_LEFT)?;
        let right = block.get_unsigned(OUTPUT_RIGHT)?;

        let routing = match (map, left, right) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(ConfigError::ConflictingRouting);
            }
            (Some(map), None, None) => ChannelRouting::Map(map.to_string()),
            (None, Some(left), Some(right)) => ChannelRouting::Stereo {
                left: left as usize,
                right: right as usize,
            },
            (None, Some(_), None) => {
                return Err(ConfigError::MissingOption {
                    present: OUTPUT_LEFT,
                    missing: OUTPUT_RIGHT,
                });
            }
            (None, None, Some(_)) => {
                return Err(ConfigError::MissingOption {
                    present: OUTPUT_RIGHT,
                    missing: OUTPUT_LEFT,
                });
            }
            (None, None, None) => ChannelRouting::Identity,
        };

        Ok(Self {
            name,
            device,
            routing,
        })
    }
}

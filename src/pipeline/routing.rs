//! Channel routing from source channels to device channels.
//!
//! A [`ChannelRouter`] turns the routing options of an output into a
//! validated [`ChannelRoutingTable`]. There are three construction paths:
//! - **Identity**: no routing configured, device channel `i` plays source channel `i`
//! - **Explicit map**: a `channel_map` string with one entry per device channel
//! - **Left/right pair**: `output_left`/`output_right` name the device channels
//!   carrying the stereo signal, every other device channel is muted
//!
//! The table is built once per open and is immutable afterwards.

use std::fmt;

use crate::config::ChannelRouting;
use crate::ConfigError;

/// Where one device channel takes its samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Copy this source channel.
    Source(usize),
    /// Play silence.
    Mute,
}

impl Route {
    /// Map value used for [`Route::Mute`] in `channel_map` strings.
    pub const MUTE_VALUE: i64 = -1;
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(channel) => write!(f, "{channel}"),
            Self::Mute => write!(f, "{}", Self::MUTE_VALUE),
        }
    }
}

/// Validated mapping from device channel index to source channel.
///
/// The table has one entry per device output channel. Every
/// [`Route::Source`] index is below the source channel count the table
/// was built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRoutingTable {
    routes: Vec<Route>,
    source_channels: usize,
}

impl ChannelRoutingTable {
    /// Number of device channels the table feeds.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if the table feeds no channels.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Number of source channels the table was validated against.
    pub fn source_channels(&self) -> usize {
        self.source_channels
    }

    /// Route for the given device channel.
    pub fn get(&self, device_channel: usize) -> Option<Route> {
        self.routes.get(device_channel).copied()
    }

    /// All routes in device channel order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Returns `true` if device channel `i` plays source channel `i` for every channel.
    pub fn is_identity(&self) -> bool {
        self.routes.len() == self.source_channels
            && self
                .routes
                .iter()
                .enumerate()
                .all(|(i, route)| *route == Route::Source(i))
    }

    /// Source channels that no device channel plays.
    pub fn unrouted_sources(&self) -> Vec<usize> {
        (0..self.source_channels)
            .filter(|source| !self.routes.contains(&Route::Source(*source)))
            .collect()
    }
}

impl fmt::Display for ChannelRoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, route) in self.routes.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{route}")?;
        }
        Ok(())
    }
}

/// Builds [`ChannelRoutingTable`]s from an output's routing options.
///
/// # Example
///
/// ```
/// use stream_output::{ChannelRouter, Route};
///
/// let router = ChannelRouter::explicit_map("0:1:-1");
/// let table = router.build(2, 3).unwrap();
/// assert_eq!(table.routes(), &[Route::Source(0), Route::Source(1), Route::Mute]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRouter {
    routing: ChannelRouting,
}

impl ChannelRouter {
    /// Creates a router for the given routing options.
    pub fn new(routing: ChannelRouting) -> Self {
        Self { routing }
    }

    /// A router that passes source channels through unchanged.
    pub fn identity() -> Self {
        Self::new(ChannelRouting::Identity)
    }

    /// A router driven by a colon-separated `channel_map` string.
    pub fn explicit_map(map: impl Into<String>) -> Self {
        Self::new(ChannelRouting::Map(map.into()))
    }

    /// A router that places the stereo signal on two device channels.
    pub fn left_right(left: usize, right: usize) -> Self {
        Self::new(ChannelRouting::Stereo { left, right })
    }

    /// The routing options this router was created from.
    pub fn routing(&self) -> &ChannelRouting {
        &self.routing
    }

    /// Builds the routing table for a stream.
    ///
    /// `source_channels` is the channel count of the PCM stream written
    /// into the sink; `device_channels` is the channel count the device
    /// reported for the negotiated format. The identity router ignores
    /// `device_channels` and produces one entry per source channel.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the map does not parse, has the wrong
    /// number of entries, or refers to channels that do not exist.
    pub fn build(
        &self,
        source_channels: usize,
        device_channels: usize,
    ) -> Result<ChannelRoutingTable, ConfigError> {
        let routes = match &self.routing {
            ChannelRouting::Identity => (0..source_channels).map(Route::Source).collect(),
            ChannelRouting::Map(map) => parse_channel_map(map, source_channels, device_channels)?,
            ChannelRouting::Stereo { left, right } => {
                left_right_routes(*left, *right, source_channels, device_channels)?
            }
        };

        Ok(ChannelRoutingTable {
            routes,
            source_channels,
        })
    }
}

/// Parses `entry (':' entry)*` where `entry := '-1' | unsigned-int`.
///
/// The parser alternates between expecting a number and expecting a
/// separator. The entry count must equal `device_channels` exactly.
fn parse_channel_map(
    map: &str,
    source_channels: usize,
    device_channels: usize,
) -> Result<Vec<Route>, ConfigError> {
    let bytes = map.as_bytes();
    let mut routes = Vec::with_capacity(device_channels);
    let mut want_number = true;
    let mut pos = 0;

    while pos < bytes.len() {
        tracing::debug!(
            "channel_map remaining: {} entries: {} want_number: {}",
            &map[pos..],
            routes.len(),
            want_number
        );

        if routes.len() >= device_channels && (want_number || bytes[pos] == b':') {
            return Err(ConfigError::TooManyEntries {
                expected: device_channels,
            });
        }

        let c = bytes[pos];
        if c == b':' && !want_number {
            pos += 1;
            want_number = true;
        } else if (c.is_ascii_digit() || c == b'-') && want_number {
            let (value, next) = parse_integer(map, pos)?;
            let route = to_route(value, source_channels)?;
            tracing::debug!("channel_map[{}] = {}", routes.len(), route);
            routes.push(route);
            pos = next;
            want_number = false;
        } else {
            return Err(invalid_character(map, pos));
        }
    }

    if routes.len() != device_channels {
        return Err(ConfigError::TooFewEntries {
            expected: device_channels,
            found: routes.len(),
        });
    }

    Ok(routes)
}

/// Reads an optionally negative decimal integer starting at `start`.
///
/// Returns the value (saturated to the `i64` range) and the offset just
/// past its last digit. Negative zero and a zero-padded `-1` are rejected.
fn parse_integer(map: &str, start: usize) -> Result<(i64, usize), ConfigError> {
    let bytes = map.as_bytes();
    let negative = bytes[start] == b'-';
    let digits_start = if negative { start + 1 } else { start };

    let digits_end = bytes[digits_start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |offset| digits_start + offset);

    if digits_end == digits_start {
        return Err(invalid_character(map, start));
    }

    let digits = &map[digits_start..digits_end];
    let magnitude = digits
        .bytes()
        .fold(0i64, |acc, digit| {
            acc.saturating_mul(10).saturating_add(i64::from(digit - b'0'))
        });
    // '-' only introduces the mute value or a value below it.
    if negative && magnitude <= 1 && digits != "1" {
        return Err(invalid_character(map, start));
    }
    let value = if negative { -magnitude } else { magnitude };

    Ok((value, digits_end))
}

fn to_route(value: i64, source_channels: usize) -> Result<Route, ConfigError> {
    if value == Route::MUTE_VALUE {
        return Ok(Route::Mute);
    }
    if value < Route::MUTE_VALUE {
        return Err(ConfigError::ValueBelowMute { value });
    }

    let channel = usize::try_from(value).unwrap_or(usize::MAX);
    if channel >= source_channels {
        return Err(ConfigError::SourceChannelOutOfRange {
            value: channel,
            channels: source_channels,
        });
    }
    Ok(Route::Source(channel))
}

fn invalid_character(map: &str, offset: usize) -> ConfigError {
    ConfigError::InvalidCharacter {
        character: map[offset..].chars().next().unwrap_or('\0'),
        offset,
    }
}

fn left_right_routes(
    left: usize,
    right: usize,
    source_channels: usize,
    device_channels: usize,
) -> Result<Vec<Route>, ConfigError> {
    for (option, value) in [("output_left", left), ("output_right", right)] {
        if value >= device_channels {
            return Err(ConfigError::DeviceChannelOutOfRange {
                option,
                value,
                channels: device_channels,
            });
        }
    }
    if left == right {
        return Err(ConfigError::DuplicateOutputChannel { channel: left });
    }
    if source_channels == 0 {
        return Err(ConfigError::SourceChannelOutOfRange {
            value: 0,
            channels: 0,
        });
    }

    // A mono source feeds both sides.
    let right_source = 1.min(source_channels - 1);

    let mut routes = vec![Route::Mute; device_channels];
    routes[left] = Route::Source(0);
    routes[right] = Route::Source(right_source);
    Ok(routes)
}

//! Stream format description and bit depth negotiation.

use std::fmt;

/// PCM sample encoding produced by the player pipeline.
///
/// Only the signed integer depths [`S8`](Self::S8), [`S16`](Self::S16) and
/// [`S32`](Self::S32) can be handed to the device as-is. Anything else is
/// coerced to [`S32`](Self::S32) when a sink opens, and the caller is told
/// so through the updated format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleFormat {
    /// Signed 8-bit.
    S8,
    /// Signed 16-bit.
    #[default]
    S16,
    /// Signed 24-bit in the low bits of a 32-bit container.
    S24P32,
    /// Signed 32-bit.
    S32,
    /// 32-bit IEEE float.
    Float,
}

impl SampleFormat {
    /// Size of one sample in bytes.
    pub fn sample_size(self) -> usize {
        match self {
            Self::S8 => 1,
            Self::S16 => 2,
            Self::S24P32 | Self::S32 | Self::Float => 4,
        }
    }

    /// Bits per sample as negotiated with the device.
    pub fn bits(self) -> u32 {
        self.sample_size() as u32 * 8
    }

    /// Returns `true` if the device accepts this encoding without coercion.
    pub fn is_device_native(self) -> bool {
        matches!(self, Self::S8 | Self::S16 | Self::S32)
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::S8 => "s8",
            Self::S16 => "s16",
            Self::S24P32 => "s24_p32",
            Self::S32 => "s32",
            Self::Float => "f32",
        };
        f.write_str(name)
    }
}

/// Format of the interleaved PCM stream written into a sink.
///
/// Samples are always in the byte order native to the target platform.
///
/// # Example
///
/// ```
/// use stream_output::format::{AudioFormat, SampleFormat};
///
/// let format = AudioFormat::new(48000, 2, SampleFormat::S16);
/// assert_eq!(format.frame_size(), 4);
/// assert_eq!(format.bytes_per_second(), Some(192_000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels per frame.
    pub channels: u16,
    /// Sample encoding.
    pub format: SampleFormat,
}

impl AudioFormat {
    /// Creates a new format description.
    pub fn new(sample_rate: u32, channels: u16, format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            format,
        }
    }

    /// CD quality: 44.1kHz stereo, 16-bit.
    pub fn cd() -> Self {
        Self::new(44100, 2, SampleFormat::S16)
    }

    /// Size of one sample in bytes.
    pub fn sample_size(&self) -> usize {
        self.format.sample_size()
    }

    /// Size of one frame (one sample per channel) in bytes.
    pub fn frame_size(&self) -> usize {
        usize::from(self.channels) * self.sample_size()
    }

    /// Bytes needed for one second of audio, or `None` on overflow.
    pub fn bytes_per_second(&self) -> Option<usize> {
        (self.sample_rate as usize).checked_mul(self.frame_size())
    }

    /// Returns `true` if the format describes a playable stream.
    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && self.frame_size() > 0
    }

    /// Applies the bit depth fallback policy.
    ///
    /// Depths the device cannot take directly become 32-bit. Returns `true`
    /// if the format was changed.
    pub fn negotiate(&mut self) -> bool {
        if self.format.is_device_native() {
            return false;
        }
        self.format = SampleFormat::S32;
        true
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::cd()
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.sample_rate, self.format, self.channels)
    }
}

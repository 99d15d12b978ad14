//! Mock PCM source for testing without a decoder.

use std::time::Duration;

use crate::format::{encode_sample, AudioFormat};

/// A mock player that generates interleaved PCM for a given format.
///
/// Stands in for the decoder pipeline: generate audio, then hand the
/// bytes to [`AudioSink::write`](crate::AudioSink::write) in chunks.
///
/// # Example
///
/// ```
/// use stream_output::format::{AudioFormat, SampleFormat};
/// use stream_output::source::MockSource;
///
/// let mut mock = MockSource::new(AudioFormat::new(16000, 1, SampleFormat::S16));
///
/// // 100ms of silence, then 100ms of a 440Hz sine wave
/// mock.generate_silence(100);
/// mock.generate_sine(440.0, 100);
///
/// let bytes = mock.take_bytes();
/// assert_eq!(bytes.len(), 2 * 3200);
/// ```
#[derive(Debug, Clone)]
pub struct MockSource {
    format: AudioFormat,
    bytes: Vec<u8>,
    phase: u64,
}

impl MockSource {
    /// Creates a new mock source producing the given format.
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            bytes: Vec::new(),
            phase: 0,
        }
    }

    /// Returns the format of the generated bytes.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Generates silence for the given duration in milliseconds.
    pub fn generate_silence(&mut self, duration_ms: u64) {
        let len = self.frames_for_duration(duration_ms) * self.format.frame_size();
        self.bytes.resize(self.bytes.len() + len, 0);
    }

    /// Generates a sine wave at the given frequency for the given duration.
    ///
    /// The same sample is written to every channel. Consecutive calls
    /// continue the waveform without a phase jump.
    pub fn generate_sine(&mut self, frequency: f64, duration_ms: u64) {
        let frames = self.frames_for_duration(duration_ms);
        let sample_rate = f64::from(self.format.sample_rate);

        for _ in 0..frames {
            let t = self.phase as f64 / sample_rate;
            let value = (2.0 * std::f64::consts::PI * frequency * t).sin() as f32;
            self.phase += 1;

            for _ in 0..self.format.channels {
                encode_sample(value, self.format.format, &mut self.bytes);
            }
        }
    }

    /// Generates one frame per entry, each channel `c` carrying `frame[c]`.
    ///
    /// Useful for recognising channels after routing. Missing entries
    /// are silent.
    pub fn generate_frames(&mut self, frames: &[Vec<f32>]) {
        for frame in frames {
            for channel in 0..usize::from(self.format.channels) {
                let value = frame.get(channel).copied().unwrap_or(0.0);
                encode_sample(value, self.format.format, &mut self.bytes);
            }
        }
    }

    /// Adds raw bytes directly.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Takes all accumulated bytes, clearing the internal buffer.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    /// Returns a reference to the accumulated bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the duration of accumulated audio.
    pub fn duration(&self) -> Duration {
        let frame_size = self.format.frame_size();
        if frame_size == 0 || self.format.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = self.bytes.len() / frame_size;
        Duration::from_secs_f64(frames as f64 / f64::from(self.format.sample_rate))
    }

    fn frames_for_duration(&self, duration_ms: u64) -> usize {
        (u64::from(self.format.sample_rate) * duration_ms / 1000) as usize
    }
}

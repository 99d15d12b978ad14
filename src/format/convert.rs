//! PCM sample encoding in native byte order.
//!
//! The ring buffer and the render path only move bytes around. These
//! helpers sit at the edges: they turn normalized samples into the byte
//! layout a [`SampleFormat`] describes, and back again for inspection.

use super::SampleFormat;

/// Encodes one normalized sample and appends it to `out`.
///
/// Input should be in the range [-1.0, 1.0]. Values outside this range
/// are clamped. Integer formats scale symmetrically (× `MAX`, not
/// `MAX + 1`), so -1.0 maps to `-MAX` rather than `MIN`.
pub fn encode_sample(sample: f32, format: SampleFormat, out: &mut Vec<u8>) {
    let sample = sample.clamp(-1.0, 1.0);
    match format {
        SampleFormat::S8 => {
            out.extend_from_slice(&((sample * f32::from(i8::MAX)) as i8).to_ne_bytes());
        }
        SampleFormat::S16 => {
            out.extend_from_slice(&((sample * f32::from(i16::MAX)) as i16).to_ne_bytes());
        }
        SampleFormat::S24P32 => {
            out.extend_from_slice(&((f64::from(sample) * 8_388_607.0) as i32).to_ne_bytes());
        }
        SampleFormat::S32 => {
            out.extend_from_slice(&((f64::from(sample) * f64::from(i32::MAX)) as i32).to_ne_bytes());
        }
        SampleFormat::Float => out.extend_from_slice(&sample.to_ne_bytes()),
    }
}

/// Decodes one sample from the start of `bytes` as a raw integer value.
///
/// Float samples are returned as their bit pattern. Returns `None` if
/// `bytes` is shorter than one sample.
pub fn decode_sample(bytes: &[u8], format: SampleFormat) -> Option<i32> {
    let raw = bytes.get(..format.sample_size())?;
    let value = match format {
        SampleFormat::S8 => i32::from(i8::from_ne_bytes([raw[0]])),
        SampleFormat::S16 => i32::from(i16::from_ne_bytes([raw[0], raw[1]])),
        SampleFormat::S24P32 | SampleFormat::S32 | SampleFormat::Float => {
            i32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])
        }
    };
    Some(value)
}

/// Encodes a slice of interleaved integer samples as native-endian bytes.
///
/// Each value is truncated to the sample width of `format`.
pub fn encode_raw(samples: &[i32], format: SampleFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * format.sample_size());
    for &sample in samples {
        match format.sample_size() {
            1 => out.extend_from_slice(&(sample as i8).to_ne_bytes()),
            2 => out.extend_from_slice(&(sample as i16).to_ne_bytes()),
            _ => out.extend_from_slice(&sample.to_ne_bytes()),
        }
    }
    out
}

/// Decodes every complete sample in `bytes`.
pub fn decode_raw(bytes: &[u8], format: SampleFormat) -> Vec<i32> {
    bytes
        .chunks_exact(format.sample_size())
        .filter_map(|chunk| decode_sample(chunk, format))
        .collect()
}

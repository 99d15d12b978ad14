//! Audio format description and PCM sample encoding.
//!
//! This module provides:
//! - The stream format a sink is opened with ([`AudioFormat`], [`SampleFormat`])
//! - The bit depth fallback applied at open time ([`AudioFormat::negotiate`])
//! - Native-endian sample encoding helpers for producers and tests

mod audio_format;
mod convert;

pub use audio_format::{AudioFormat, SampleFormat};
pub use convert::{decode_raw, decode_sample, encode_raw, encode_sample};

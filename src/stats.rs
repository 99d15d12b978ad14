//! Playback statistics shared between the player and the render callback.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a sink's playback counters.
///
/// Counters accumulate over the lifetime of the sink, across open/close
/// cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Bytes accepted by `write`.
    pub bytes_written: u64,
    /// Bytes dropped by `cancel`.
    pub bytes_discarded: u64,
    /// Render callback invocations.
    pub callbacks: u64,
    /// Frames filled from buffered audio.
    pub frames_rendered: u64,
    /// Frames filled with silence because no audio was buffered.
    pub silent_frames: u64,
    /// Callbacks that could not be fully served from the buffer.
    pub underruns: u64,
}

/// Internal counters updated without taking the sink lock.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub bytes_written: AtomicU64,
    pub bytes_discarded: AtomicU64,
    pub callbacks: AtomicU64,
    pub frames_rendered: AtomicU64,
    pub silent_frames: AtomicU64,
    pub underruns: AtomicU64,
}

impl StatsCounters {
    pub fn record_write(&self, bytes: usize) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_discard(&self, bytes: usize) {
        self.bytes_discarded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_render(&self, requested: usize, rendered: usize) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        self.frames_rendered.fetch_add(rendered as u64, Ordering::Relaxed);
        if rendered < requested {
            self.underruns.fetch_add(1, Ordering::Relaxed);
            self.silent_frames
                .fetch_add((requested - rendered) as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> SinkStats {
        SinkStats {
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_discarded: self.bytes_discarded.load(Ordering::Relaxed),
            callbacks: self.callbacks.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            silent_frames: self.silent_frames.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }
}

//! Real-time render path and the state it shares with the player thread.
//!
//! The driver pulls audio on a thread it owns by calling
//! [`RenderCallback::render`]. The player pushes audio with blocking
//! writes. Both sides meet at one mutex around the ring buffer; a
//! condition variable signalled after every consume wakes a writer
//! waiting for space.
//!
//! The render side never blocks beyond that critical section, never
//! allocates and never fails: any shortfall or inconsistency is masked
//! with silence.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::pipeline::{ChannelRoutingTable, Route, RingBuffer};
use crate::stats::StatsCounters;
use crate::{OutputError, SinkStats};

/// One driver-owned destination buffer.
///
/// A buffer carries `channels` interleaved device channels. A driver
/// with interleaved output passes a single buffer holding every device
/// channel; a planar driver passes one single-channel buffer per device
/// channel. Device channels are numbered across buffers in order.
#[derive(Debug)]
pub struct OutputBuffer<'a> {
    channels: usize,
    data: &'a mut [u8],
}

impl<'a> OutputBuffer<'a> {
    /// Wraps a destination holding `channels` interleaved channels.
    pub fn new(channels: usize, data: &'a mut [u8]) -> Self {
        Self { channels, data }
    }

    /// Number of device channels in this buffer.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The destination bytes.
    pub fn data(&self) -> &[u8] {
        self.data
    }

    fn required_len(&self, frames: usize, sample_size: usize) -> Option<usize> {
        frames.checked_mul(self.channels)?.checked_mul(sample_size)
    }

    /// Zeroes frames `[from, to)`, clamped to the buffer length.
    fn silence(&mut self, from: usize, to: usize, sample_size: usize) {
        let stride = self.channels * sample_size;
        let end = to.saturating_mul(stride).min(self.data.len());
        let start = from.saturating_mul(stride).min(end);
        self.data[start..end].fill(0);
    }
}

/// Everything the render callback needs while a sink is open.
#[derive(Debug)]
pub(crate) struct Playback {
    pub ring: RingBuffer,
    table: ChannelRoutingTable,
    sample_size: usize,
    frame_size: usize,
}

impl Playback {
    pub fn new(ring: RingBuffer, table: ChannelRoutingTable, sample_size: usize) -> Self {
        let frame_size = table.source_channels() * sample_size;
        debug_assert_eq!(ring.capacity() % frame_size, 0);
        Self {
            ring,
            table,
            sample_size,
            frame_size,
        }
    }

    pub fn table(&self) -> &ChannelRoutingTable {
        &self.table
    }

    /// Checks that the destination layout matches the routing table.
    fn accepts(&self, frames: usize, buffers: &[OutputBuffer<'_>]) -> bool {
        let channels: usize = buffers.iter().map(OutputBuffer::channels).sum();
        channels == self.table.len()
            && buffers.iter().all(|buffer| {
                buffer
                    .required_len(frames, self.sample_size)
                    .is_some_and(|len| len <= buffer.data.len())
            })
    }

    /// Copies up to `frames` buffered frames into the destination.
    ///
    /// Returns the number of frames written.
    fn render(&mut self, frames: usize, buffers: &mut [OutputBuffer<'_>]) -> usize {
        let mut done = 0;

        while done < frames {
            // The capacity is a whole number of frames and reads start at a
            // frame boundary, so a partial frame here is still being written.
            let src = self.ring.read();
            let available = (src.len() / self.frame_size).min(frames - done);
            if available == 0 {
                break;
            }

            for (i, frame) in src.chunks_exact(self.frame_size).take(available).enumerate() {
                route_frame(&self.table, self.sample_size, frame, done + i, buffers);
            }

            self.ring.consume(available * self.frame_size);
            done += available;
        }

        done
    }
}

/// De-interleaves one source frame into the destination buffers.
fn route_frame(
    table: &ChannelRoutingTable,
    sample_size: usize,
    frame: &[u8],
    index: usize,
    buffers: &mut [OutputBuffer<'_>],
) {
    let mut routes = table.routes().iter();

    for buffer in buffers.iter_mut() {
        let base = index * buffer.channels * sample_size;
        for channel in 0..buffer.channels {
            let offset = base + channel * sample_size;
            let dst = &mut buffer.data[offset..offset + sample_size];
            match routes.next() {
                Some(Route::Source(source)) => {
                    let start = source * sample_size;
                    dst.copy_from_slice(&frame[start..start + sample_size]);
                }
                Some(Route::Mute) | None => dst.fill(0),
            }
        }
    }
}

/// State guarded by the sink mutex.
#[derive(Debug, Default)]
pub(crate) struct SinkInner {
    playback: Option<Playback>,
    /// Bumped to make blocked writers give up.
    abort_generation: u64,
}

/// State shared by the sink, its writers and the render callback.
#[derive(Debug, Default)]
pub(crate) struct SinkShared {
    inner: Mutex<SinkInner>,
    space_available: Condvar,
    stats: StatsCounters,
}

impl SinkShared {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes a freshly opened stream visible to the render callback.
    pub fn install(&self, playback: Playback) {
        let mut inner = self.inner.lock();
        inner.playback = Some(playback);
    }

    /// Detaches the stream and wakes any writer still waiting on it.
    pub fn uninstall(&self) -> Option<Playback> {
        let mut inner = self.inner.lock();
        inner.abort_generation = inner.abort_generation.wrapping_add(1);
        let playback = inner.playback.take();
        self.space_available.notify_all();
        playback
    }

    /// Copies as much of `data` as currently fits, waiting for space if
    /// the buffer is full.
    pub fn write(&self, data: &[u8]) -> Result<usize, OutputError> {
        if data.is_empty() {
            return Ok(0);
        }

        let mut inner = self.inner.lock();
        let generation = inner.abort_generation;

        loop {
            if inner.abort_generation != generation {
                return Err(OutputError::Aborted);
            }
            let Some(playback) = inner.playback.as_mut() else {
                return Err(OutputError::Aborted);
            };

            let accepted = playback.ring.write(data);
            if accepted > 0 {
                self.stats.record_write(accepted);
                return Ok(accepted);
            }

            // Spurious wakeups fall through to another attempt.
            self.space_available.wait(&mut inner);
        }
    }

    /// Drops all buffered audio and wakes blocked writers.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock();
        if let Some(playback) = inner.playback.as_mut() {
            let discarded = playback.ring.clear();
            self.stats.record_discard(discarded);
        }
        self.space_available.notify_all();
    }

    /// Makes every writer currently blocked in [`write`](Self::write) give up.
    pub fn abort(&self) {
        let mut inner = self.inner.lock();
        inner.abort_generation = inner.abort_generation.wrapping_add(1);
        self.space_available.notify_all();
    }

    pub fn buffered_bytes(&self) -> usize {
        self.inner
            .lock()
            .playback
            .as_ref()
            .map_or(0, |playback| playback.ring.used())
    }

    pub fn routing_table(&self) -> Option<ChannelRoutingTable> {
        self.inner
            .lock()
            .playback
            .as_ref()
            .map(|playback| playback.table().clone())
    }

    pub fn stats(&self) -> SinkStats {
        self.stats.snapshot()
    }

    fn render(&self, frames: usize, buffers: &mut [OutputBuffer<'_>]) -> usize {
        let mut inner = self.inner.lock();

        let outcome = match inner.playback.as_mut() {
            Some(playback) if playback.accepts(frames, buffers) => {
                Some((playback.render(frames, buffers), playback.sample_size))
            }
            _ => None,
        };

        if matches!(outcome, Some((rendered, _)) if rendered > 0) {
            self.space_available.notify_all();
        }
        drop(inner);

        let rendered = match outcome {
            Some((rendered, sample_size)) => {
                if rendered < frames {
                    for buffer in buffers.iter_mut() {
                        buffer.silence(rendered, frames, sample_size);
                    }
                }
                rendered
            }
            None => {
                for buffer in buffers.iter_mut() {
                    buffer.data.fill(0);
                }
                0
            }
        };

        self.stats.record_render(frames, rendered);
        rendered
    }
}

/// Handle the driver calls from its real-time thread.
///
/// The handle is registered with the driver when a sink is enabled and
/// stays valid across open/close cycles. Between streams it renders
/// silence.
///
/// # Example
///
/// ```
/// use stream_output::{AudioSink, OutputBuffer, OutputConfig};
/// use stream_output::driver::MockDriver;
/// use stream_output::format::{AudioFormat, SampleFormat};
///
/// let mut sink = AudioSink::new(OutputConfig::default(), MockDriver::new());
/// sink.enable().unwrap();
/// let mut format = AudioFormat::new(48000, 2, SampleFormat::S16);
/// sink.open(&mut format).unwrap();
///
/// let callback = sink.driver().callback().unwrap();
/// let mut data = vec![0xAAu8; 480 * 4];
/// let rendered = callback.render(480, &mut [OutputBuffer::new(2, &mut data)]);
///
/// // Nothing was written yet, so the whole request is silence.
/// assert_eq!(rendered, 0);
/// assert!(data.iter().all(|&b| b == 0));
/// ```
#[derive(Clone)]
pub struct RenderCallback {
    shared: Arc<SinkShared>,
}

impl RenderCallback {
    pub(crate) fn new(shared: Arc<SinkShared>) -> Self {
        Self { shared }
    }

    /// Fills `frames` frames across `buffers`.
    ///
    /// Buffered audio is de-interleaved through the routing table; muted
    /// device channels are zeroed. Any frames the buffer cannot supply are
    /// zero-filled. Returns the number of frames taken from the buffer;
    /// a value below `frames` means an underrun.
    pub fn render(&self, frames: usize, buffers: &mut [OutputBuffer<'_>]) -> usize {
        self.shared.render(frames, buffers)
    }
}

impl std::fmt::Debug for RenderCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCallback").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{decode_raw, encode_raw, SampleFormat};
    use crate::ChannelRouter;

    fn open_shared(
        router: &ChannelRouter,
        source: usize,
        device: usize,
        capacity: usize,
    ) -> Arc<SinkShared> {
        let shared = SinkShared::new();
        let table = router.build(source, device).unwrap();
        let ring = RingBuffer::new(capacity).unwrap();
        shared.install(Playback::new(ring, table, 2));
        shared
    }

    #[test]
    fn test_render_without_playback_is_silent() {
        let shared = SinkShared::new();
        let callback = RenderCallback::new(Arc::clone(&shared));

        let mut data = vec![0xFFu8; 64];
        let rendered = callback.render(16, &mut [OutputBuffer::new(2, &mut data)]);

        assert_eq!(rendered, 0);
        assert!(data.iter().all(|&b| b == 0));
        assert_eq!(shared.stats().underruns, 1);
    }

    #[test]
    fn test_render_deinterleaves_into_planar_buffers() {
        let shared = open_shared(&ChannelRouter::identity(), 2, 2, 64);
        let callback = RenderCallback::new(Arc::clone(&shared));

        let pcm = encode_raw(&[1, -1, 2, -2, 3, -3], SampleFormat::S16);
        assert_eq!(shared.write(&pcm).unwrap(), pcm.len());

        let mut left = vec![0u8; 6];
        let mut right = vec![0u8; 6];
        let rendered = callback.render(
            3,
            &mut [OutputBuffer::new(1, &mut left), OutputBuffer::new(1, &mut right)],
        );

        assert_eq!(rendered, 3);
        assert_eq!(decode_raw(&left, SampleFormat::S16), vec![1, 2, 3]);
        assert_eq!(decode_raw(&right, SampleFormat::S16), vec![-1, -2, -3]);
        assert_eq!(shared.buffered_bytes(), 0);
    }

    #[test]
    fn test_render_applies_routing_and_zeroes_muted_channels() {
        let shared = open_shared(&ChannelRouter::explicit_map("1:-1:0"), 2, 3, 64);
        let callback = RenderCallback::new(Arc::clone(&shared));

        shared.write(&encode_raw(&[10, 20, 30, 40], SampleFormat::S16)).unwrap();

        let mut data = vec![0x55u8; 2 * 3 * 2];
        let rendered = callback.render(2, &mut [OutputBuffer::new(3, &mut data)]);

        assert_eq!(rendered, 2);
        assert_eq!(
            decode_raw(&data, SampleFormat::S16),
            vec![20, 0, 10, 40, 0, 30]
        );
    }

    #[test]
    fn test_render_pads_shortfall_with_silence() {
        let shared = open_shared(&ChannelRouter::identity(), 1, 1, 64);
        let callback = RenderCallback::new(Arc::clone(&shared));

        shared.write(&encode_raw(&[7, 8], SampleFormat::S16)).unwrap();

        let mut data = vec![0xFFu8; 8];
        let rendered = callback.render(4, &mut [OutputBuffer::new(1, &mut data)]);

        assert_eq!(rendered, 2);
        assert_eq!(decode_raw(&data, SampleFormat::S16), vec![7, 8, 0, 0]);

        let stats = shared.stats();
        assert_eq!(stats.frames_rendered, 2);
        assert_eq!(stats.silent_frames, 2);
    }

    #[test]
    fn test_render_continues_across_wrap_point() {
        // 4 frames of mono 16-bit
        let shared = open_shared(&ChannelRouter::identity(), 1, 1, 8);
        let callback = RenderCallback::new(Arc::clone(&shared));
        let mut scratch = vec![0u8; 8];

        shared.write(&encode_raw(&[1, 2, 3], SampleFormat::S16)).unwrap();
        callback.render(3, &mut [OutputBuffer::new(1, &mut scratch)]);

        // Occupies the last slot and wraps into the first two.
        shared.write(&encode_raw(&[4, 5, 6], SampleFormat::S16)).unwrap();

        let mut data = vec![0u8; 6];
        let rendered = callback.render(3, &mut [OutputBuffer::new(1, &mut data)]);
        assert_eq!(rendered, 3);
        assert_eq!(decode_raw(&data, SampleFormat::S16), vec![4, 5, 6]);
    }

    #[test]
    fn test_render_rejects_mismatched_layout() {
        let shared = open_shared(&ChannelRouter::identity(), 2, 2, 64);
        let callback = RenderCallback::new(Arc::clone(&shared));
        shared.write(&encode_raw(&[1, 2], SampleFormat::S16)).unwrap();

        // Three channels offered for a two-channel table
        let mut data = vec![0xFFu8; 6];
        let rendered = callback.render(1, &mut [OutputBuffer::new(3, &mut data)]);
        assert_eq!(rendered, 0);
        assert!(data.iter().all(|&b| b == 0));

        // The buffered frame is still there for a well-formed request.
        assert_eq!(shared.buffered_bytes(), 4);
    }

    #[test]
    fn test_render_short_destination_is_silent() {
        let shared = open_shared(&ChannelRouter::identity(), 2, 2, 64);
        let callback = RenderCallback::new(Arc::clone(&shared));
        shared.write(&encode_raw(&[1, 2, 3, 4], SampleFormat::S16)).unwrap();

        let mut data = vec![0xFFu8; 4];
        let rendered = callback.render(2, &mut [OutputBuffer::new(2, &mut data)]);
        assert_eq!(rendered, 0);
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_cancel_discards_buffered_audio() {
        let shared = open_shared(&ChannelRouter::identity(), 1, 1, 16);
        shared.write(&[1; 10]).unwrap();

        shared.cancel();

        assert_eq!(shared.buffered_bytes(), 0);
        assert_eq!(shared.stats().bytes_discarded, 10);
    }

    #[test]
    fn test_cancel_after_partial_frame_keeps_channel_order() {
        // Stereo 16-bit: 4 byte frames, 3 frames of storage
        let shared = open_shared(&ChannelRouter::identity(), 2, 2, 12);
        let callback = RenderCallback::new(Arc::clone(&shared));

        // One and a half frames leave the write position mid-frame.
        shared.write(&[0; 6]).unwrap();
        shared.cancel();

        shared.write(&encode_raw(&[1, 2, 1, 2, 1, 2], SampleFormat::S16)).unwrap();
        let mut data = vec![0u8; 12];
        let rendered = callback.render(3, &mut [OutputBuffer::new(2, &mut data)]);

        assert_eq!(rendered, 3);
        assert_eq!(decode_raw(&data, SampleFormat::S16), vec![1, 2, 1, 2, 1, 2]);
        assert_eq!(shared.buffered_bytes(), 0);
    }

    #[test]
    fn test_cancel_after_render_and_partial_frame() {
        let shared = open_shared(&ChannelRouter::identity(), 2, 2, 12);
        let callback = RenderCallback::new(Arc::clone(&shared));
        let mut scratch = vec![0u8; 12];

        shared.write(&encode_raw(&[5, 6], SampleFormat::S16)).unwrap();
        shared.write(&[0; 3]).unwrap();
        assert_eq!(callback.render(3, &mut [OutputBuffer::new(2, &mut scratch)]), 1);
        shared.cancel();

        // Two rounds so the second one crosses the end of the storage.
        for round in 0..2 {
            shared.write(&encode_raw(&[1, 2, 3, 4], SampleFormat::S16)).unwrap();
            let mut data = vec![0u8; 8];
            let rendered = callback.render(2, &mut [OutputBuffer::new(2, &mut data)]);
            assert_eq!(rendered, 2, "round {round}");
            assert_eq!(decode_raw(&data, SampleFormat::S16), vec![1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_write_empty_returns_immediately() {
        let shared = open_shared(&ChannelRouter::identity(), 1, 1, 2);
        shared.write(&[1, 1]).unwrap();
        // Full buffer, but an empty write must not wait for space.
        assert_eq!(shared.write(&[]).unwrap(), 0);
    }

    #[test]
    fn test_write_after_uninstall_is_aborted() {
        let shared = open_shared(&ChannelRouter::identity(), 1, 1, 8);
        assert!(shared.uninstall().is_some());
        assert!(matches!(shared.write(&[1]), Err(OutputError::Aborted)));
    }
}

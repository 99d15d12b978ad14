//! Audio pipeline components.
//!
//! The pipeline connects the player to the device driver via a ring buffer:
//!
//! ```text
//! Player Thread → write() → Ring Buffer → RenderCallback → Driver Thread
//! ```
//!
//! - **Ring Buffer**: Bounded byte FIFO absorbing rate differences
//! - **Routing**: Maps device channels onto source channels or silence
//! - **Render**: De-interleaves buffered frames into driver buffers and
//!   pads underruns with silence
//!
//! Writers block when the buffer is full; the render callback never waits
//! beyond one short critical section.

mod render;
mod ring_buffer;
mod routing;

pub use render::{OutputBuffer, RenderCallback};
pub(crate) use render::{Playback, SinkShared};
pub use ring_buffer::RingBuffer;
pub use routing::{ChannelRouter, ChannelRoutingTable, Route};

//! Synthetic audio producers.
//!
//! Stand-ins for the decoder pipeline that feeds a sink, used by the
//! tests and demos.

mod mock;

pub use mock::MockSource;

//! Stream adapters and the scheduler-facing block interface.
//!
//! # Blocks
//! - [`OpusEncodeBlock`] - Float samples in, Opus packets out
//! - [`OpusDecodeBlock`] - Opus byte stream in, float samples out
//!
//! # Framing
//! - [`framing`] - Packet boundary recovery for unframed byte streams

pub mod decode;
pub mod encode;
pub mod framing;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use decode::{DecodeStats, OpusDecodeBlock};
pub use encode::{EncodeStats, OpusEncodeBlock};
pub use framing::{CandidateLadder, PacketFraming};
pub use traits::Block;

//! Audio primitives shared by both adapters.
//!
//! # Codec
//! - [`opus`] - libopus encoder/decoder state behind [`FrameEncoder`] and [`PacketDecoder`]
//!
//! # Samples
//! - [`sample`] - Float/16-bit conversion and peak measurement
//!
//! # Buffers
//! - [`buffers::BoundedQueue`] - FIFO that drops its oldest items when full

pub mod buffers;
pub mod opus;
pub mod sample;

pub use buffers::BoundedQueue;
pub use opus::{FrameEncoder, OpusDecoderState, OpusEncoderState, PacketDecoder};
pub use sample::{dequantize, peak_amplitude, quantize};

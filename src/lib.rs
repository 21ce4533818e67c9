//! Streaming adapters around the Opus codec.
//!
//! [`OpusEncodeBlock`] turns an arbitrarily chunked stream of normalized
//! float samples into Opus packets, one 20 ms frame at a time.
//! [`OpusDecodeBlock`] turns a stream of packet bytes back into samples,
//! either with a fixed packet size or by searching for packet boundaries.
//! Both are driven through the [`Block`] trait.

pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;

pub use config::{Application, DecoderConfig, EncodeFailurePolicy, EncoderConfig};
pub use error::{Error, Result};
pub use pipeline::{Block, DecodeStats, EncodeStats, OpusDecodeBlock, OpusEncodeBlock};

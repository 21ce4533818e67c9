//! Packet boundary recovery for the decode side.
//!
//! A byte stream either carries packets of a known fixed size, or carries
//! Opus packets back to back with no length prefix at all. In the second case
//! the decoder has to guess where each packet ends: it tries a small ladder
//! of candidate lengths, shortest first, and accepts the first one that
//! decodes to something louder than silence.
//!
//! The heuristic is only as good as that amplitude gate. A short prefix of a
//! real packet can decode "successfully" as near-silent noise; the gate throws
//! those away. The price is that a genuinely silent packet is also rejected,
//! so recovery stalls on silence until the backlog overflows past it.

use std::collections::BTreeSet;

/// Upper bound on ladder entries.
pub const MAX_CANDIDATES: usize = 50;

/// Sequential candidates never go beyond this length.
pub const MAX_CANDIDATE_LEN: usize = 4000;

/// Packet lengths typical of 20 ms Opus frames at common bitrates.
pub const REFERENCE_PACKET_SIZES: [usize; 11] =
    [60, 80, 100, 120, 150, 180, 200, 250, 300, 350, 400];

const ESTIMATE_DIVISOR: usize = 5;
const MIN_ESTIMATE: usize = 40;
const MAX_ESTIMATE: usize = 400;

/// A speculative decode must peak above this (on the 16-bit scale) to count.
pub const SILENCE_THRESHOLD: u16 = 100;

/// How packet boundaries are found in the decoder's byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketFraming {
    /// Every packet is exactly this many bytes.
    Fixed(usize),
    /// Boundaries are guessed with a [`CandidateLadder`].
    Variable,
}

impl PacketFraming {
    pub fn from_packet_size(packet_size: usize) -> Self {
        if packet_size > 0 {
            PacketFraming::Fixed(packet_size)
        } else {
            PacketFraming::Variable
        }
    }
}

/// Ascending set of trial packet lengths for one decode call.
///
/// Built from three sources, merged and deduplicated:
/// 1. an estimate of `buffered / 5` clamped to 40..=400, if it fits;
/// 2. [`REFERENCE_PACKET_SIZES`] that fit in the buffer;
/// 3. lengths 1, 2, 3, ... filling the ladder up to [`MAX_CANDIDATES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLadder {
    sizes: Vec<usize>,
}

impl CandidateLadder {
    pub fn build(buffered: usize) -> Self {
        let mut sizes = BTreeSet::new();

        let estimated = (buffered / ESTIMATE_DIVISOR).clamp(MIN_ESTIMATE, MAX_ESTIMATE);
        if estimated <= buffered {
            sizes.insert(estimated);
        }

        sizes.extend(
            REFERENCE_PACKET_SIZES
                .iter()
                .copied()
                .filter(|&size| size <= buffered),
        );

        for size in 1..=buffered.min(MAX_CANDIDATE_LEN) {
            if sizes.len() >= MAX_CANDIDATES {
                break;
            }
            sizes.insert(size);
        }

        Self {
            sizes: sizes.into_iter().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.sizes.iter().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.sizes
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

//! Core pipeline traits.
//!
//! This module defines the abstraction every adapter is driven through:
//!
//! - [`Block`] - A processing unit that consumes one input chunk and fills
//!   one output region per call

/// A scheduler-driven processing block.
///
/// The scheduler calls [`work`](Block::work) repeatedly with whatever input
/// arrived since the previous call and a pre-allocated output region. The block
/// consumes all of the input (keeping what it cannot use yet), never blocks,
/// and returns how many output items it wrote.
pub trait Block: Send {
    type Input;
    type Output;

    /// Consume `input` and write as much output as possible.
    ///
    /// Returns the number of items written, never more than `output.len()`.
    fn work(&mut self, input: &[Self::Input], output: &mut [Self::Output]) -> usize;

    /// Input items the block would like to see to fill `noutput_items`.
    fn forecast(&self, noutput_items: usize) -> usize {
        noutput_items
    }
}

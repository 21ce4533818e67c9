//! Audio buffer implementations.
//!
//! - [`BoundedQueue`] - A capacity-limited FIFO with drop-oldest overflow,
//!   used for the encoder's sample backlog and the decoder's byte backlog

pub mod bounded_queue;

pub use bounded_queue::BoundedQueue;

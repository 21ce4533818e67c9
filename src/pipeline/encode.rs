//! Encode adapter: normalized float samples in, Opus packets out.
//!
//! Incoming samples accumulate in a bounded backlog (10 seconds of audio).
//! Each call cuts as many 20 ms frames off the front as fit in the output
//! region, quantizes them to 16-bit PCM and hands them to the codec. A packet
//! that does not fit in the remaining output puts its frame back at the front
//! of the backlog so it is the first frame encoded next call.

use tracing::{debug, warn};

use crate::audio::buffers::BoundedQueue;
use crate::audio::opus::{FrameEncoder, OpusEncoderState};
use crate::audio::sample::quantize;
use crate::config::{EncodeFailurePolicy, EncoderConfig};
use crate::error::Result;
use crate::pipeline::Block;

/// Counters accumulated over the lifetime of an [`OpusEncodeBlock`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    pub frames_encoded: u64,
    pub bytes_produced: u64,
    pub encode_failures: u64,
    pub frames_dropped: u64,
    pub frames_pushed_back: u64,
    pub samples_evicted: u64,
}

pub struct OpusEncodeBlock<E = OpusEncoderState> {
    config: EncoderConfig,
    encoder: E,
    backlog: BoundedQueue<f32>,
    frame_size: usize,
    pcm: Vec<i16>,
    // The frame at the head of the backlog already failed once.
    retry_pending: bool,
    stats: EncodeStats,
}

impl OpusEncodeBlock {
    /// Create an encode adapter backed by libopus.
    pub fn new(config: EncoderConfig) -> Result<Self> {
        let encoder = OpusEncoderState::new(&config)?;
        Self::with_encoder(config, encoder)
    }
}

impl<E: FrameEncoder> OpusEncodeBlock<E> {
    /// Create an encode adapter around any codec engine.
    pub fn with_encoder(config: EncoderConfig, encoder: E) -> Result<Self> {
        config.validate()?;
        let frame_size = config.frame_size();
        Ok(Self {
            backlog: BoundedQueue::new(config.backlog_capacity()),
            pcm: Vec::with_capacity(config.frame_samples()),
            frame_size,
            config,
            encoder,
            retry_pending: false,
            stats: EncodeStats::default(),
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Samples per channel in one frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn channels(&self) -> usize {
        self.config.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Samples waiting in the backlog.
    pub fn buffered(&self) -> usize {
        self.backlog.len()
    }

    pub fn stats(&self) -> EncodeStats {
        self.stats
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Drop the backlog and the codec history.
    pub fn reset(&mut self) -> Result<()> {
        self.backlog.clear();
        self.retry_pending = false;
        self.encoder.reset()
    }

    fn on_encode_failure(&mut self, frame: Vec<f32>) {
        self.stats.encode_failures += 1;
        match self.config.failure_policy {
            EncodeFailurePolicy::RetryOnce if !self.retry_pending => {
                self.backlog.push_front(&frame);
                self.retry_pending = true;
                debug!("frame put back for one retry");
            }
            _ => {
                self.retry_pending = false;
                self.stats.frames_dropped += 1;
                debug!(samples = frame.len(), "frame dropped after encode failure");
            }
        }
    }
}

impl<E: FrameEncoder> Block for OpusEncodeBlock<E> {
    type Input = f32;
    type Output = u8;

    fn work(&mut self, input: &[f32], output: &mut [u8]) -> usize {
        let evicted = self.backlog.append(input);
        if evicted > 0 {
            self.stats.samples_evicted += evicted as u64;
            // The head frame may be gone; a pending retry no longer refers to it.
            self.retry_pending = false;
            debug!(
                evicted,
                buffered = self.backlog.len(),
                "sample backlog full, dropped oldest samples"
            );
        }

        let frame_samples = self.config.frame_samples();
        let mut written = 0;

        while self.backlog.len() >= frame_samples && written < output.len() {
            let frame = self.backlog.consume_prefix(frame_samples);
            self.pcm.clear();
            self.pcm.extend(frame.iter().map(|&s| quantize(s)));

            let packet = match self.encoder.encode(&self.pcm, self.frame_size) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("Opus encoding failed: {}", e);
                    self.on_encode_failure(frame);
                    break;
                }
            };

            let end = written + packet.len();
            if end > output.len() {
                debug!(
                    packet_len = packet.len(),
                    remaining = output.len() - written,
                    "packet does not fit, deferring frame to next call"
                );
                self.backlog.push_front(&frame);
                self.stats.frames_pushed_back += 1;
                break;
            }

            output[written..end].copy_from_slice(packet);
            written = end;
            self.retry_pending = false;
            self.stats.frames_encoded += 1;
            self.stats.bytes_produced += packet.len() as u64;
        }

        written
    }

    /// At least one whole frame, and roughly four input samples per output byte.
    fn forecast(&self, noutput_items: usize) -> usize {
        self.config.frame_samples().max(noutput_items * 4)
    }
}

//! Decode adapter: a byte stream of Opus packets in, normalized float samples out.
//!
//! Bytes accumulate in a 1 MiB backlog. Depending on [`PacketFraming`], each
//! call either slices fixed-size packets off the front, or searches for the
//! next packet boundary with a [`CandidateLadder`].
//!
//! Fixed-size packets are always consumed, whether or not they decode. In
//! variable mode nothing is consumed until a candidate is accepted, so a call
//! that finds no boundary leaves the backlog untouched for the next call.

use tracing::{debug, trace};

use crate::audio::buffers::BoundedQueue;
use crate::audio::opus::{OpusDecoderState, PacketDecoder};
use crate::audio::sample::{dequantize, peak_amplitude};
use crate::config::{BYTE_BACKLOG_CAPACITY, DecoderConfig};
use crate::error::Result;
use crate::pipeline::Block;
use crate::pipeline::framing::{CandidateLadder, PacketFraming, SILENCE_THRESHOLD};

/// Counters accumulated over the lifetime of an [`OpusDecodeBlock`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub packets_decoded: u64,
    /// Every call into the codec, including rejected candidates.
    pub decode_attempts: u64,
    pub decode_failures: u64,
    /// Candidates that decoded but stayed under the silence threshold.
    pub silent_candidates: u64,
    /// Fixed-size packets thrown away after a failed decode.
    pub bytes_discarded: u64,
    /// Decoded samples that did not fit in the output region.
    pub samples_truncated: u64,
    pub bytes_evicted: u64,
}

pub struct OpusDecodeBlock<D = OpusDecoderState> {
    config: DecoderConfig,
    decoder: D,
    backlog: BoundedQueue<u8>,
    framing: PacketFraming,
    frame_size: usize,
    stats: DecodeStats,
}

impl OpusDecodeBlock {
    /// Create a decode adapter backed by libopus.
    pub fn new(config: DecoderConfig) -> Result<Self> {
        let decoder = OpusDecoderState::new(&config)?;
        Self::with_decoder(config, decoder)
    }
}

impl<D: PacketDecoder> OpusDecodeBlock<D> {
    /// Create a decode adapter around any codec engine.
    pub fn with_decoder(config: DecoderConfig, decoder: D) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backlog: BoundedQueue::new(BYTE_BACKLOG_CAPACITY),
            framing: config.framing(),
            frame_size: config.frame_size(),
            config,
            decoder,
            stats: DecodeStats::default(),
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn framing(&self) -> PacketFraming {
        self.framing
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

    /// Bytes waiting in the backlog.
    pub fn buffered(&self) -> usize {
        self.backlog.len()
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Drop the backlog and the codec history.
    pub fn reset(&mut self) -> Result<()> {
        self.backlog.clear();
        self.decoder.reset()
    }

    fn decode_fixed(&mut self, packet_size: usize, output: &mut [f32]) -> usize {
        let mut written = 0;

        while self.backlog.len() >= packet_size && written < output.len() {
            let packet = self.backlog.consume_prefix(packet_size);
            self.stats.decode_attempts += 1;

            match self.decoder.decode(&packet, self.frame_size) {
                Ok(pcm) => {
                    written += write_samples(pcm, &mut output[written..], &mut self.stats);
                    self.stats.packets_decoded += 1;
                }
                Err(e) => {
                    self.stats.decode_failures += 1;
                    self.stats.bytes_discarded += packet_size as u64;
                    debug!(packet_size, "discarding undecodable packet: {}", e);
                }
            }
        }

        written
    }

    fn decode_variable(&mut self, output: &mut [f32]) -> usize {
        let ladder = CandidateLadder::build(self.backlog.len());
        let mut written = 0;

        while written < output.len() && !self.backlog.is_empty() {
            let mut accepted = None;

            for size in ladder.iter() {
                if size > self.backlog.len() {
                    continue;
                }

                self.stats.decode_attempts += 1;
                let candidate = self.backlog.peek_prefix(size);
                match self.decoder.decode(candidate, self.frame_size) {
                    Ok(pcm) if peak_amplitude(pcm) > SILENCE_THRESHOLD => {
                        written += write_samples(pcm, &mut output[written..], &mut self.stats);
                        accepted = Some(size);
                        break;
                    }
                    Ok(_) => {
                        self.stats.silent_candidates += 1;
                        trace!(size, "candidate decoded below silence threshold");
                    }
                    Err(e) => {
                        self.stats.decode_failures += 1;
                        trace!(size, "candidate rejected: {}", e);
                    }
                }
            }

            match accepted {
                Some(size) => {
                    self.backlog.discard_prefix(size);
                    self.stats.packets_decoded += 1;
                }
                None => {
                    debug!(
                        buffered = self.backlog.len(),
                        candidates = ladder.len(),
                        "no packet boundary found, waiting for more data"
                    );
                    break;
                }
            }
        }

        written
    }
}

/// Copy as much of `pcm` as fits into `output`, converting to float.
fn write_samples(pcm: &[i16], output: &mut [f32], stats: &mut DecodeStats) -> usize {
    let count = pcm.len().min(output.len());
    for (out, &sample) in output.iter_mut().zip(&pcm[..count]) {
        *out = dequantize(sample);
    }
    stats.samples_truncated += (pcm.len() - count) as u64;
    count
}

impl<D: PacketDecoder> Block for OpusDecodeBlock<D> {
    type Input = u8;
    type Output = f32;

    fn work(&mut self, input: &[u8], output: &mut [f32]) -> usize {
        let evicted = self.backlog.append(input);
        if evicted > 0 {
            self.stats.bytes_evicted += evicted as u64;
            debug!(
                evicted,
                buffered = self.backlog.len(),
                "byte backlog full, dropped oldest bytes"
            );
        }

        match self.framing {
            PacketFraming::Fixed(packet_size) => self.decode_fixed(packet_size, output),
            PacketFraming::Variable => self.decode_variable(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::opus::FrameEncoder;
    use crate::audio::sample::quantize;
    use crate::config::EncoderConfig;
    use crate::pipeline::encode::OpusEncodeBlock;
    use crate::pipeline::mock::{LengthTaggedDecoder, RejectingDecoder, tagged_packet};

    // 8 kHz mono keeps frames at 160 samples.
    const FRAME: usize = 160;

    fn tagged_block(packet_size: usize) -> OpusDecodeBlock<LengthTaggedDecoder> {
        let config = DecoderConfig::new(8000, 1).with_packet_size(packet_size);
        OpusDecodeBlock::with_decoder(config, LengthTaggedDecoder::new(1)).unwrap()
    }

    fn concat(packets: &[Vec<u8>]) -> Vec<u8> {
        packets.iter().flatten().copied().collect()
    }

    #[test]
    fn test_fixed_decodes_whole_packets() {
        let mut block = tagged_block(20);
        let input = concat(&[tagged_packet(20, 10), tagged_packet(20, 20), tagged_packet(20, 30)]);
        let mut out = vec![0.0f32; FRAME * 4];

        let written = block.work(&input, &mut out);

        assert_eq!(written, FRAME * 3);
        assert_eq!(block.decoder().attempts, 3);
        assert_eq!(block.buffered(), 0);
        assert!((out[0] - 1000.0 / 32767.0).abs() < 1e-6);
        assert!((out[FRAME * 2] - 3000.0 / 32767.0).abs() < 1e-6);
    }

    #[test]
    fn test_fixed_attempts_bounded_by_packet_count() {
        let config = DecoderConfig::new(8000, 1).with_packet_size(25);
        let mut block = OpusDecodeBlock::with_decoder(config, RejectingDecoder::default()).unwrap();
        let mut out = vec![0.0f32; FRAME * 10];

        let written = block.work(&[7u8; 25 * 6], &mut out);

        assert_eq!(written, 0);
        assert_eq!(block.decoder().attempts, 6);
        assert_eq!(block.buffered(), 0);
        assert_eq!(block.stats().bytes_discarded, 150);
        assert_eq!(block.stats().decode_failures, 6);
    }

    #[test]
    fn test_fixed_keeps_partial_packet() {
        let mut block = tagged_block(20);
        let mut input = tagged_packet(20, 10);
        input.extend_from_slice(&[20, 10, 0xAA]);
        let mut out = vec![0.0f32; FRAME * 4];

        assert_eq!(block.work(&input, &mut out), FRAME);
        assert_eq!(block.buffered(), 3);

        assert_eq!(block.work(&[0xAA; 17], &mut out), FRAME);
        assert_eq!(block.buffered(), 0);
    }

    #[test]
    fn test_fixed_stops_when_output_full() {
        let mut block = tagged_block(20);
        let input = concat(&[tagged_packet(20, 10), tagged_packet(20, 20)]);
        let mut out = vec![0.0f32; FRAME];

        assert_eq!(block.work(&input, &mut out), FRAME);
        assert_eq!(block.buffered(), 20);
    }

    #[test]
    fn test_fixed_truncates_to_output_capacity() {
        let mut block = tagged_block(20);
        let mut out = vec![0.0f32; 100];

        assert_eq!(block.work(&tagged_packet(20, 10), &mut out), 100);
        assert_eq!(block.stats().samples_truncated, (FRAME - 100) as u64);
    }

    #[test]
    fn test_variable_splits_concatenated_packets() {
        let mut block = tagged_block(0);
        let input = concat(&[tagged_packet(12, 5), tagged_packet(30, 6), tagged_packet(25, 7)]);
        let mut out = vec![0.0f32; FRAME * 4];

        let written = block.work(&input, &mut out);

        assert_eq!(written, FRAME * 3);
        assert_eq!(block.buffered(), 0);
        assert_eq!(block.stats().packets_decoded, 3);
        assert!((out[FRAME] - 600.0 / 32767.0).abs() < 1e-6);
        assert!((out[FRAME * 2] - 700.0 / 32767.0).abs() < 1e-6);
    }

    #[test]
    fn test_variable_no_match_keeps_bytes() {
        let mut block = tagged_block(0);
        let mut out = vec![0.0f32; FRAME * 4];

        assert_eq!(block.work(&[200u8; 50], &mut out), 0);
        assert_eq!(block.buffered(), 50);

        assert_eq!(block.work(&[200u8; 10], &mut out), 0);
        assert_eq!(block.buffered(), 60);
        assert_eq!(block.stats().bytes_discarded, 0);
    }

    #[test]
    fn test_variable_waits_for_rest_of_packet() {
        let mut block = tagged_block(0);
        let packet = tagged_packet(30, 9);
        let mut out = vec![0.0f32; FRAME * 4];

        assert_eq!(block.work(&packet[..10], &mut out), 0);
        assert_eq!(block.buffered(), 10);

        assert_eq!(block.work(&packet[10..], &mut out), FRAME);
        assert_eq!(block.buffered(), 0);
    }

    #[test]
    fn test_variable_silence_is_not_accepted() {
        let mut block = tagged_block(0);
        // Level 1 decodes to a peak of exactly 100, which does not exceed the threshold.
        let input = concat(&[tagged_packet(20, 1), tagged_packet(20, 50)]);
        let mut out = vec![0.0f32; FRAME * 4];

        assert_eq!(block.work(&input, &mut out), 0);
        assert_eq!(block.buffered(), 40);
        assert_eq!(block.stats().silent_candidates, 1);
    }

    #[test]
    fn test_variable_stops_when_output_full() {
        let mut block = tagged_block(0);
        let input = concat(&[tagged_packet(15, 5), tagged_packet(15, 5)]);
        let mut out = vec![0.0f32; FRAME];

        assert_eq!(block.work(&input, &mut out), FRAME);
        assert_eq!(block.buffered(), 15);

        assert_eq!(block.work(&[], &mut out), FRAME);
        assert_eq!(block.buffered(), 0);
    }

    #[test]
    fn test_variable_empty_input_does_nothing() {
        let mut block = tagged_block(0);
        let mut out = vec![0.0f32; FRAME];
        assert_eq!(block.work(&[], &mut out), 0);
        assert_eq!(block.decoder().attempts, 0);
    }

    #[test]
    fn test_byte_backlog_full_plus_one() {
        let mut block = tagged_block(0);
        let data = vec![0xEEu8; BYTE_BACKLOG_CAPACITY];

        block.work(&data, &mut []);
        assert_eq!(block.buffered(), BYTE_BACKLOG_CAPACITY);

        block.work(&[0x01], &mut []);
        assert_eq!(block.buffered(), BYTE_BACKLOG_CAPACITY);
        assert_eq!(block.stats().bytes_evicted, 1);
    }

    #[test]
    fn test_stereo_output_stays_interleaved() {
        let config = DecoderConfig::new(8000, 2).with_packet_size(10);
        let mut block = OpusDecodeBlock::with_decoder(config, LengthTaggedDecoder::new(2)).unwrap();
        let mut out = vec![0.0f32; FRAME * 2];

        assert_eq!(block.work(&tagged_packet(10, 3), &mut out), FRAME * 2);
    }

    #[test]
    fn test_opus_decoder_rejects_bad_config() {
        assert!(OpusDecodeBlock::new(DecoderConfig::new(44100, 1)).is_err());
        assert!(OpusDecodeBlock::new(DecoderConfig::new(48000, 3)).is_err());
    }

    #[test]
    fn test_opus_fixed_size_single_packet() {
        let mut encoder = crate::audio::opus::OpusEncoderState::new(&EncoderConfig::new(48000, 1)).unwrap();
        let tone: Vec<i16> = (0..960 * 3)
            .map(|i| quantize((i as f32 * 0.06).sin() * 0.5))
            .collect();

        // Warm the encoder up so the last packet carries a steady tone.
        let packets: Vec<Vec<u8>> = tone
            .chunks(960)
            .map(|frame| encoder.encode(frame, 960).unwrap().to_vec())
            .collect();
        let packet = packets.last().unwrap();

        let config = DecoderConfig::new(48000, 1).with_packet_size(packet.len());
        let mut block = OpusDecodeBlock::new(config).unwrap();
        let mut out = vec![0.0f32; 960 * 2];

        let written = block.work(packet, &mut out);

        assert_eq!(written, 960);
        assert_eq!(block.buffered(), 0);
        assert!(out[..written].iter().any(|s| s.abs() > 0.01));
    }

    #[test]
    fn test_opus_fixed_size_discards_garbage() {
        let config = DecoderConfig::new(48000, 1).with_packet_size(4);
        let mut block = OpusDecodeBlock::new(config).unwrap();
        let mut out = vec![0.0f32; 960];

        // TOC code 3 with a frame count of zero is never a valid packet.
        let garbage = [0x03u8, 0x00, 0x00, 0x00];
        assert_eq!(block.work(&garbage, &mut out), 0);
        assert_eq!(block.buffered(), 0);
        assert_eq!(block.stats().decode_failures, 1);
    }

    #[test]
    fn test_encode_then_decode_through_both_adapters() {
        let mut encode = OpusEncodeBlock::new(EncoderConfig::new(48000, 1).with_bitrate(128000)).unwrap();
        let mut decoder = OpusDecoderState::new(&DecoderConfig::new(48000, 1)).unwrap();
        let input: Vec<f32> = (0..960 * 8).map(|i| (i as f32 * 0.0576).sin() * 0.3).collect();

        let mut decoded = Vec::new();
        let mut packet = vec![0u8; 4000];
        for chunk in input.chunks(960) {
            // One frame in, one packet out, so the returned length frames it.
            let len = encode.work(chunk, &mut packet);
            assert!(len > 0);

            let pcm = decoder.decode(&packet[..len], 960).unwrap();
            decoded.extend(pcm.iter().map(|&s| dequantize(s)));
        }

        assert_eq!(decoded.len(), input.len());
        let tail = &decoded[960 * 4..];
        let peak = tail.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.2 && peak < 0.4, "unexpected peak {}", peak);
    }
}

//! Deterministic stand-ins for the Opus engine, for exercising the adapters'
//! buffering and framing logic without libopus in the loop.

use crate::audio::opus::{FrameEncoder, PacketDecoder};
use crate::error::{Error, Result};

/// Records every frame it sees and emits a packet of `packet_len` bytes derived
/// from the frame contents. Calls listed in `fail_on` (0-based) fail instead.
pub struct ScriptedEncoder {
    pub packet_len: usize,
    pub fail_on: Vec<usize>,
    pub calls: Vec<Vec<i16>>,
    buffer: Vec<u8>,
}

impl ScriptedEncoder {
    pub fn new(packet_len: usize) -> Self {
        Self {
            packet_len,
            fail_on: Vec::new(),
            calls: Vec::new(),
            buffer: Vec::new(),
        }
    }

    pub fn failing_on(mut self, calls: &[usize]) -> Self {
        self.fail_on = calls.to_vec();
        self
    }
}

impl FrameEncoder for ScriptedEncoder {
    fn encode(&mut self, pcm: &[i16], _frame_size: usize) -> Result<&[u8]> {
        let call = self.calls.len();
        self.calls.push(pcm.to_vec());
        if self.fail_on.contains(&call) {
            return Err(Error::encode(format!("scripted failure on call {}", call)));
        }

        let seed = pcm
            .iter()
            .fold(0u32, |acc, &s| acc.wrapping_mul(31).wrapping_add(s as u16 as u32));
        self.buffer.clear();
        self.buffer
            .extend((0..self.packet_len).map(|i| (seed.wrapping_add(i as u32) & 0xFF) as u8));
        Ok(&self.buffer)
    }
}

/// Builds a packet understood by [`LengthTaggedDecoder`]: the first byte is
/// the packet length, the second the signal level.
pub fn tagged_packet(len: usize, level: u8) -> Vec<u8> {
    assert!((2..=255).contains(&len));
    let mut packet = vec![0xAA; len];
    packet[0] = len as u8;
    packet[1] = level;
    packet
}

/// Accepts a packet only if its first byte equals its length. Decodes to a
/// full frame with every sample at `level * 100`.
pub struct LengthTaggedDecoder {
    pub channels: usize,
    pub attempts: usize,
    buffer: Vec<i16>,
}

impl LengthTaggedDecoder {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            attempts: 0,
            buffer: Vec::new(),
        }
    }
}

impl PacketDecoder for LengthTaggedDecoder {
    fn decode(&mut self, packet: &[u8], frame_size: usize) -> Result<&[i16]> {
        self.attempts += 1;
        if packet.len() < 2 || packet[0] as usize != packet.len() {
            return Err(Error::decode("length tag mismatch"));
        }

        let level = packet[1] as i16 * 100;
        self.buffer.clear();
        self.buffer.resize(frame_size * self.channels, level);
        Ok(&self.buffer)
    }
}

/// Rejects everything, counting attempts.
#[derive(Default)]
pub struct RejectingDecoder {
    pub attempts: usize,
}

impl PacketDecoder for RejectingDecoder {
    fn decode(&mut self, _packet: &[u8], _frame_size: usize) -> Result<&[i16]> {
        self.attempts += 1;
        Err(Error::decode("rejected"))
    }
}

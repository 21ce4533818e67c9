//! Opus codec engine.
//!
//! The adapters talk to the codec through two small traits:
//! - [`FrameEncoder`] turns one frame of 16-bit PCM into a packet
//! - [`PacketDecoder`] turns one packet back into 16-bit PCM
//!
//! [`OpusEncoderState`] and [`OpusDecoderState`] implement them on top of
//! libopus. Both keep codec history between calls; the adapters never look
//! inside it.

use opus::{Bitrate, Channels, Decoder, Encoder};

use crate::config::{Application, DecoderConfig, EncoderConfig};
use crate::error::{Error, Result};

/// Largest packet libopus is asked to produce.
pub const MAX_OPUS_PACKET_SIZE: usize = 4000;

/// 120 ms at 48 kHz, the longest frame a single Opus packet can carry.
const MAX_FRAME_SIZE: usize = 5760;

/// Encodes fixed-size frames of interleaved 16-bit PCM.
pub trait FrameEncoder: Send {
    /// Encode `frame_size` samples per channel. The returned packet borrows
    /// the encoder's scratch buffer until the next call.
    fn encode(&mut self, pcm: &[i16], frame_size: usize) -> Result<&[u8]>;

    /// Drop codec history, as if freshly constructed.
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Decodes packets into interleaved 16-bit PCM.
pub trait PacketDecoder: Send {
    /// Decode one packet into at most `frame_size` samples per channel.
    fn decode(&mut self, packet: &[u8], frame_size: usize) -> Result<&[i16]>;

    /// Drop codec history, as if freshly constructed.
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }
}

fn channels_to_opus(channels: usize) -> Result<Channels> {
    match channels {
        1 => Ok(Channels::Mono),
        2 => Ok(Channels::Stereo),
        _ => Err(Error::configuration(format!(
            "Opus only supports 1 or 2 channels, got {}",
            channels
        ))),
    }
}

impl From<Application> for opus::Application {
    fn from(application: Application) -> Self {
        match application {
            Application::Voip => opus::Application::Voip,
            Application::Audio => opus::Application::Audio,
            Application::LowDelay => opus::Application::LowDelay,
        }
    }
}

pub struct OpusEncoderState {
    encoder: Encoder,
    channels: usize,
    output_buffer: Vec<u8>,
}

impl OpusEncoderState {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        config.validate()?;
        let channels = channels_to_opus(config.channels)?;

        let mut encoder = Encoder::new(config.sample_rate, channels, config.application.into())
            .map_err(|e| Error::configuration(format!("failed to create Opus encoder: {}", e)))?;

        encoder
            .set_bitrate(Bitrate::Bits(config.bitrate))
            .map_err(|e| Error::configuration(format!("failed to set Opus bitrate: {}", e)))?;

        Ok(Self {
            encoder,
            channels: config.channels,
            output_buffer: vec![0u8; MAX_OPUS_PACKET_SIZE],
        })
    }

    /// Encoder delay in samples per channel.
    pub fn lookahead(&mut self) -> Result<usize> {
        self.encoder
            .get_lookahead()
            .map(|samples| samples as usize)
            .map_err(|e| Error::encode(format!("failed to query lookahead: {}", e)))
    }
}

impl FrameEncoder for OpusEncoderState {
    fn encode(&mut self, pcm: &[i16], frame_size: usize) -> Result<&[u8]> {
        let expected = frame_size * self.channels;
        if pcm.len() != expected {
            return Err(Error::encode(format!(
                "frame holds {} samples, expected {} ({} per channel)",
                pcm.len(),
                expected,
                frame_size
            )));
        }

        let len = self
            .encoder
            .encode(pcm, &mut self.output_buffer)
            .map_err(|e| Error::encode(format!("Opus encoding failed: {}", e)))?;

        Ok(&self.output_buffer[..len])
    }

    fn reset(&mut self) -> Result<()> {
        self.encoder
            .reset_state()
            .map_err(|e| Error::encode(format!("failed to reset Opus encoder: {}", e)))
    }
}

pub struct OpusDecoderState {
    decoder: Decoder,
    channels: usize,
    output_buffer: Vec<i16>,
}

impl OpusDecoderState {
    pub fn new(config: &DecoderConfig) -> Result<Self> {
        config.validate()?;
        let channels = channels_to_opus(config.channels)?;

        let decoder = Decoder::new(config.sample_rate, channels)
            .map_err(|e| Error::configuration(format!("failed to create Opus decoder: {}", e)))?;

        Ok(Self {
            decoder,
            channels: config.channels,
            output_buffer: vec![0i16; MAX_FRAME_SIZE * config.channels],
        })
    }
}

impl PacketDecoder for OpusDecoderState {
    fn decode(&mut self, packet: &[u8], frame_size: usize) -> Result<&[i16]> {
        // libopus treats an empty packet as a loss and conceals it, which is
        // not a decode of anything the caller sent.
        if packet.is_empty() {
            return Err(Error::decode("empty packet"));
        }

        let capacity = (frame_size * self.channels).min(self.output_buffer.len());
        let samples_per_channel = self
            .decoder
            .decode(packet, &mut self.output_buffer[..capacity], false)
            .map_err(|e| Error::decode(format!("Opus decoding failed: {}", e)))?;

        Ok(&self.output_buffer[..samples_per_channel * self.channels])
    }

    fn reset(&mut self) -> Result<()> {
        self.decoder
            .reset_state()
            .map_err(|e| Error::decode(format!("failed to reset Opus decoder: {}", e)))
    }
}

//! Construction parameters for the encode and decode adapters.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::framing::PacketFraming;

/// Sample rates libopus accepts.
pub const SUPPORTED_SAMPLE_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

/// Frames are always 20 ms long.
pub const FRAME_DURATION_MS: u32 = 20;

/// The encoder keeps at most this many seconds of audio queued.
pub const SAMPLE_BACKLOG_SECONDS: usize = 10;

/// Fixed byte backlog of the decoder, independent of configuration.
pub const BYTE_BACKLOG_CAPACITY: usize = 1024 * 1024;

/// Samples per channel in one 20 ms frame.
pub fn frame_size_for(sample_rate: u32) -> usize {
    (sample_rate * FRAME_DURATION_MS / 1000) as usize
}

/// Opus application mode.
///
/// Parsing is case-insensitive and never fails: unrecognized names fall back
/// to [`Application::Audio`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Application {
    /// Best for voice/speech
    Voip,
    /// Best for music
    #[default]
    Audio,
    /// Restricted low-delay mode
    LowDelay,
}

impl Application {
    pub fn as_str(&self) -> &'static str {
        match self {
            Application::Voip => "voip",
            Application::Audio => "audio",
            Application::LowDelay => "lowdelay",
        }
    }
}

impl FromStr for Application {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "voip" => Application::Voip,
            "lowdelay" => Application::LowDelay,
            _ => Application::Audio,
        })
    }
}

impl From<String> for Application {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the encoder does with a frame the codec failed to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeFailurePolicy {
    /// The frame's audio is lost and the call stops.
    #[default]
    Drop,
    /// The frame is put back and retried on the next call. A second failure
    /// of the same frame drops it.
    RetryOnce,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub sample_rate: u32,
    pub channels: usize,
    /// Target bitrate in bits per second
    pub bitrate: i32,
    pub application: Application,
    pub failure_policy: EncodeFailurePolicy,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
            bitrate: 64000,
            application: Application::Audio,
            failure_policy: EncodeFailurePolicy::Drop,
        }
    }
}

impl EncoderConfig {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
            ..Default::default()
        }
    }

    pub fn with_bitrate(mut self, bitrate: i32) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_application(mut self, application: Application) -> Self {
        self.application = application;
        self
    }

    pub fn with_failure_policy(mut self, policy: EncodeFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn frame_size(&self) -> usize {
        frame_size_for(self.sample_rate)
    }

    /// Interleaved samples in one frame across all channels.
    pub fn frame_samples(&self) -> usize {
        self.frame_size() * self.channels
    }

    pub fn backlog_capacity(&self) -> usize {
        self.sample_rate as usize * self.channels * SAMPLE_BACKLOG_SECONDS
    }

    pub fn validate(&self) -> Result<()> {
        validate_stream(self.sample_rate, self.channels)?;
        if self.bitrate <= 0 {
            return Err(Error::configuration(format!(
                "bitrate must be positive, got {}",
                self.bitrate
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub sample_rate: u32,
    pub channels: usize,
    /// Fixed packet size in bytes, 0 for variable framing
    pub packet_size: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
            packet_size: 0,
        }
    }
}

impl DecoderConfig {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
            ..Default::default()
        }
    }

    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    pub fn frame_size(&self) -> usize {
        frame_size_for(self.sample_rate)
    }

    pub fn framing(&self) -> PacketFraming {
        PacketFraming::from_packet_size(self.packet_size)
    }

    pub fn validate(&self) -> Result<()> {
        validate_stream(self.sample_rate, self.channels)
    }
}

fn validate_stream(sample_rate: u32, channels: usize) -> Result<()> {
    if !SUPPORTED_SAMPLE_RATES.contains(&sample_rate) {
        return Err(Error::configuration(format!(
            "unsupported sample rate {} Hz, expected one of {:?}",
            sample_rate, SUPPORTED_SAMPLE_RATES
        )));
    }
    if !(1..=2).contains(&channels) {
        return Err(Error::configuration(format!(
            "Opus supports 1 or 2 channels, got {}",
            channels
        )));
    }
    Ok(())
}

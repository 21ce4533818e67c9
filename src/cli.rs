//! Command-line interface of the `opus-loopback` demo.

use std::path::PathBuf;

use clap::Parser;

/// Push audio through the Opus encode and decode adapters and write the result.
#[derive(Parser, Debug)]
pub struct Args {
    /// WAV file to encode (a sine tone is synthesized when omitted)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Where to write the decoded audio
    #[arg(long, default_value = "loopback.wav")]
    pub output: PathBuf,

    /// JSON file with `encoder` and `decoder` sections; overrides the flags below
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Sample rate in Hz (8000, 12000, 16000, 24000 or 48000)
    #[arg(long, default_value_t = 48000)]
    pub sample_rate: u32,

    /// Number of interleaved channels (1 or 2)
    #[arg(long, default_value_t = 1)]
    pub channels: usize,

    /// Target bitrate in bits per second
    #[arg(long, default_value_t = 64000)]
    pub bitrate: i32,

    /// Opus application: voip, audio or lowdelay
    #[arg(long, default_value = "audio")]
    pub application: String,

    /// Decoder packet size in bytes; 0 searches for packet boundaries
    #[arg(long, default_value_t = 0)]
    pub packet_size: usize,

    /// Samples handed to the encoder per call
    #[arg(long, default_value_t = 1024)]
    pub chunk_samples: usize,

    /// Output bytes offered to the encoder per call
    #[arg(long, default_value_t = 4000)]
    pub encode_capacity: usize,

    /// Output samples offered to the decoder per call
    #[arg(long, default_value_t = 8192)]
    pub decode_capacity: usize,

    /// Length of the synthesized tone in seconds
    #[arg(long, default_value_t = 2.0)]
    pub seconds: f32,

    /// Frequency of the synthesized tone in Hz
    #[arg(long, default_value_t = 440.0)]
    pub frequency: f32,
}

mod cli;

use std::f32::consts::TAU;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Deserialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use cli::Args;
use opus_stream_adapters::{
    Application, Block, DecoderConfig, EncoderConfig, OpusDecodeBlock, OpusEncodeBlock,
};

/// Shape of the `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoopbackConfig {
    encoder: EncoderConfig,
    decoder: DecoderConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let (encoder_config, decoder_config) = load_configs(&args)?;

    let samples = match &args.input {
        Some(path) => read_wav(path, &encoder_config)?,
        None => synthesize_tone(&args, &encoder_config),
    };
    info!(
        samples = samples.len(),
        sample_rate = encoder_config.sample_rate,
        channels = encoder_config.channels,
        "input ready"
    );

    let decoded = run_loopback(&args, &samples, encoder_config.clone(), decoder_config)?;

    write_wav(&args.output, &decoded, &encoder_config)?;
    info!(
        samples = decoded.len(),
        path = %args.output.display(),
        "decoded audio written"
    );

    Ok(())
}

fn load_configs(args: &Args) -> Result<(EncoderConfig, DecoderConfig)> {
    if let Some(path) = &args.config {
        let file = File::open(path)
            .with_context(|| format!("failed to open config {}", path.display()))?;
        let config: LoopbackConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        return Ok((config.encoder, config.decoder));
    }

    let application: Application = args.application.parse().unwrap_or_default();
    let encoder = EncoderConfig::new(args.sample_rate, args.channels)
        .with_bitrate(args.bitrate)
        .with_application(application);
    let decoder = DecoderConfig::new(args.sample_rate, args.channels)
        .with_packet_size(args.packet_size);
    Ok((encoder, decoder))
}

fn read_wav(path: &Path, config: &EncoderConfig) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();

    if spec.sample_rate != config.sample_rate || spec.channels as usize != config.channels {
        bail!(
            "{} is {} Hz / {} ch, encoder expects {} Hz / {} ch",
            path.display(),
            spec.sample_rate,
            spec.channels,
            config.sample_rate,
            config.channels
        );
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(samples)
}

fn synthesize_tone(args: &Args, config: &EncoderConfig) -> Vec<f32> {
    let frames = (args.seconds * config.sample_rate as f32) as usize;
    let step = TAU * args.frequency / config.sample_rate as f32;

    (0..frames)
        .flat_map(|i| std::iter::repeat_n((i as f32 * step).sin() * 0.5, config.channels))
        .collect()
}

fn run_loopback(
    args: &Args,
    samples: &[f32],
    encoder_config: EncoderConfig,
    decoder_config: DecoderConfig,
) -> Result<Vec<f32>> {
    if args.chunk_samples == 0 {
        bail!("chunk size must be at least one sample");
    }

    let mut encoder =
        OpusEncodeBlock::new(encoder_config).context("failed to create encode adapter")?;
    let mut decoder =
        OpusDecodeBlock::new(decoder_config).context("failed to create decode adapter")?;
    info!(
        frame_size = encoder.frame_size(),
        framing = ?decoder.framing(),
        "adapters ready"
    );

    let mut packets = vec![0u8; args.encode_capacity];
    let mut pcm = vec![0.0f32; args.decode_capacity];
    let mut decoded = Vec::with_capacity(samples.len());

    let mut pump = |input: &[f32], decoded: &mut Vec<f32>| {
        let bytes = encoder.work(input, &mut packets);
        let written = decoder.work(&packets[..bytes], &mut pcm);
        decoded.extend_from_slice(&pcm[..written]);
        debug!(input = input.len(), bytes, written, "chunk processed");
    };

    for chunk in samples.chunks(args.chunk_samples) {
        pump(chunk, &mut decoded);
    }

    // Drain whatever the adapters are still holding.
    let mut idle = 0;
    while idle < 2 {
        let before = decoded.len();
        pump(&[], &mut decoded);
        idle = if decoded.len() == before { idle + 1 } else { 0 };
    }

    let encode_stats = encoder.stats();
    let decode_stats = decoder.stats();
    info!(?encode_stats, "encoder finished");
    info!(?decode_stats, "decoder finished");
    if decoder.buffered() > 0 {
        warn!(
            bytes = decoder.buffered(),
            "decoder left bytes without a recognizable packet boundary"
        );
    }

    Ok(decoded)
}

fn write_wav(path: &Path, samples: &[f32], config: &EncoderConfig) -> Result<()> {
    let spec = hound::WavSpec {
        channels: config.channels as u16,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create {}", path.display()))?;

    for &sample in samples {
        writer.write_sample(opus_stream_adapters::audio::quantize(sample))?;
    }
    writer.finalize()?;

    Ok(())
}

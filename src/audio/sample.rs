//! Conversions between normalized float samples and 16-bit PCM.
//!
//! Both directions use the same scale (`i16::MAX`, 32767) so that a sample
//! quantized by the encode side comes back at the same level on the decode side.

const PCM16_SCALE: f32 = i16::MAX as f32;

/// Quantize a normalized sample to 16-bit PCM.
///
/// The input is clamped to [-1.0, 1.0], scaled by 32767 and truncated toward zero.
pub fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * PCM16_SCALE) as i16
}

/// Convert a 16-bit PCM sample back to a normalized float in [-1.0, 1.0].
pub fn dequantize(sample: i16) -> f32 {
    (sample as f32 / PCM16_SCALE).clamp(-1.0, 1.0)
}

/// Peak absolute amplitude of a PCM block, 0 for an empty block.
pub fn peak_amplitude(samples: &[i16]) -> u16 {
    samples
        .iter()
        .map(|s| s.unsigned_abs())
        .max()
        .unwrap_or(0)
}

//! Sample-rate conversion for recognizer compatibility (16kHz mono)
//!
//! Plain linear interpolation. Not band-limited (no anti-aliasing filter),
//! which is adequate for speech recognition but not for playback-quality
//! conversion. Do not swap in a filtered resampler without revisiting the
//! length and edge guarantees below.

use tracing::debug;

/// Target sample rate required by the recognition engine
pub const RECOGNIZER_SAMPLE_RATE: u32 = 16_000;

/// Resample a mono buffer from `source_rate` to `target_rate` by linear
/// interpolation.
///
/// Equal rates return the input unchanged. Otherwise the output holds
/// `floor(len * target / source)` samples (at least one for non-empty
/// input); each output sample blends the two bracketing source samples by
/// the fractional source position, with the upper index clamped to the last
/// valid sample so the tail never reads past the end.
pub fn resample_linear(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if input.is_empty() || source_rate == target_rate {
        return input.to_vec();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = ((input.len() as f64 * ratio).floor() as usize).max(1);
    let last = input.len() - 1;

    let mut output = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let index = src_pos as usize;
        let frac = src_pos - index as f64;
        let next = (index + 1).min(last);
        let sample = input[index] as f64 * (1.0 - frac) + input[next] as f64 * frac;
        output.push(sample as f32);
    }

    debug!(
        "Resampled {} samples at {} Hz to {} samples at {} Hz",
        input.len(),
        source_rate,
        output.len(),
        target_rate
    );

    output
}

/// Resample a buffer to the recognizer's fixed rate
pub fn resample_to_recognizer(samples: &[f32], source_rate: u32) -> Vec<f32> {
    resample_linear(samples, source_rate, RECOGNIZER_SAMPLE_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rate_returns_input() {
        let input: Vec<f32> = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        let output = resample_linear(&input, 16000, 16000);
        assert_eq!(input, output);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample_linear(&[], 44100, 16000).is_empty());
    }

    #[test]
    fn test_output_length_floor() {
        let input = vec![0.0f32; 44100];
        let output = resample_linear(&input, 44100, 16000);
        // floor(44100 * 16000 / 44100)
        assert_eq!(output.len(), 16000);

        let input = vec![0.0f32; 1001];
        let output = resample_linear(&input, 48000, 16000);
        assert_eq!(output.len(), (1001.0f64 * 16000.0 / 48000.0).floor() as usize);
    }

    #[test]
    fn test_minimum_one_sample() {
        // Heavy downsampling of a tiny buffer still yields one sample
        let input = vec![0.5f32, 0.7];
        let output = resample_linear(&input, 48000, 8000);
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_first_sample_unchanged() {
        let input: Vec<f32> = (0..100).map(|i| (i as f32) / 100.0).collect();
        let output = resample_linear(&input, 44100, 16000);
        // Index 0 has fractional offset zero
        assert!((output[0] - input[0]).abs() < 1e-7);
    }

    #[test]
    fn test_upsample_interpolates_midpoints() {
        // Doubling the rate places every odd output sample halfway between
        // neighboring inputs
        let input = vec![0.0f32, 1.0, 0.0, -1.0];
        let output = resample_linear(&input, 8000, 16000);
        assert_eq!(output.len(), 8);
        assert!((output[0] - 0.0).abs() < 1e-6);
        assert!((output[1] - 0.5).abs() < 1e-6);
        assert!((output[2] - 1.0).abs() < 1e-6);
        assert!((output[3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_tail_is_clamped() {
        // The final output positions fall past the last input index; the
        // blend must clamp to the last sample instead of reading beyond it
        let input = vec![1.0f32; 10];
        let output = resample_linear(&input, 8000, 16000);
        assert_eq!(output.len(), 20);
        for s in &output {
            assert!((s - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_resample_to_recognizer() {
        let input = vec![0.0f32; 44100];
        let output = resample_to_recognizer(&input, 44100);
        assert_eq!(output.len(), RECOGNIZER_SAMPLE_RATE as usize);
    }
}

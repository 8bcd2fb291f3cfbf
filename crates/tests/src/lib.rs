//! Shared helpers for the cross-crate tests

use bandsplit_core::domain::audio::CHANNELS;
use bandsplit_core::domain::config::ProcessorSettings;
use bandsplit_core::domain::pipeline::Pipeline;

pub const SAMPLE_RATE: u32 = 48000;

/// Interleaved stereo sine, identical on both channels
///
/// `start_frame` keeps the phase continuous across consecutive blocks.
pub fn sine_block(frames: usize, freq: f32, amplitude: f32, start_frame: usize) -> Vec<i16> {
    (start_frame..start_frame + frames)
        .flat_map(|i| {
            let phase = 2.0 * std::f64::consts::PI * f64::from(freq) * i as f64 / f64::from(SAMPLE_RATE);
            let sample = (f64::from(amplitude) * phase.sin() * 32767.0).round() as i16;
            [sample, sample]
        })
        .collect()
}

/// Interleaved block with a single full-scale-ish click on the first frame
pub fn impulse_block(frames: usize, value: i16) -> Vec<i16> {
    let mut block = vec![0; frames * CHANNELS];
    block[0] = value;
    block[1] = value;
    block
}

/// Left channel of an interleaved block
pub fn left(block: &[i16]) -> Vec<i16> {
    block.iter().step_by(CHANNELS).copied().collect()
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Settings with every compressor and limiter switched off
pub fn without_dynamics(mut settings: ProcessorSettings) -> ProcessorSettings {
    for params in &mut settings.compressor {
        params.enabled = false;
    }
    for params in &mut settings.limiter {
        params.enabled = false;
    }
    settings
}

/// Run a long interleaved signal through a pipeline block by block
pub fn process_signal(pipeline: &mut Pipeline, input: &[i16]) -> Vec<i16> {
    let block_samples = pipeline.config().block_samples();
    let mut output = vec![0; input.len()];
    for (input, output) in input
        .chunks(block_samples)
        .zip(output.chunks_mut(block_samples))
    {
        pipeline.process_block(input, output);
    }
    output
}

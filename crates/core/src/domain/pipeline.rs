//! Block-processing pipeline
//!
//! Sequences every stage for one interleaved stereo block:
//! - int16 to float conversion and input metering
//! - crossover split per channel (band gain and mute applied there)
//! - per band: metering, compressor, limiter, alignment delay
//! - band summing, output metering, float to int16 with clip counting
//!
//! The pipeline owns no threads and never fails while processing; settings
//! are pushed in between blocks through the component setters.

pub mod stats;

pub use stats::{hold_peak, ProcessingStatistics, PEAK_DECAY};

use crate::domain::audio::{
    deinterleave, interleave, peak_level, AudioError, Channel, Result, SampleRate, CHANNELS,
    DEFAULT_BLOCK_FRAMES,
};
use crate::domain::config::ProcessorSettings;
use crate::domain::crossover::{Band, BandBuffers, CrossoverNetwork, BAND_COUNT};
use crate::domain::delay::DelayLine;
use crate::domain::dsp::{params, Compressor, Dynamics, Limiter};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Construction-time parameters of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sample_rate_hz: u32,
    /// Stereo frames per block
    pub block_frames: usize,
    /// Longest per-band delay the rings can hold
    pub max_delay_ms: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 48000,
            block_frames: DEFAULT_BLOCK_FRAMES,
            max_delay_ms: params::MAX_DELAY_MS,
        }
    }
}

impl PipelineConfig {
    pub fn sample_rate(&self) -> SampleRate {
        SampleRate::from_hz(self.sample_rate_hz)
    }

    /// Interleaved `i16` entries per block
    pub fn block_samples(&self) -> usize {
        self.block_frames * CHANNELS
    }

    /// Real-time budget for one block
    pub fn block_period(&self) -> Duration {
        Duration::from_secs_f64(self.block_frames as f64 / f64::from(self.sample_rate_hz.max(1)))
    }

    pub fn validate(&self) -> Result<()> {
        self.sample_rate().validate()?;
        if self.block_frames == 0 {
            return Err(AudioError::InvalidConfiguration(
                "block_frames must be at least 1".to_string(),
            ));
        }
        if !self.max_delay_ms.is_finite() || self.max_delay_ms < 0.0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "max_delay_ms must be a non-negative number, got {}",
                self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Dynamics stages of one band, run in order
#[derive(Debug, Clone)]
pub struct BandStrip {
    pub compressor: Compressor,
    pub limiter: Limiter,
}

impl BandStrip {
    fn new(sample_rate: f32) -> Self {
        Self {
            compressor: Compressor::new(sample_rate),
            limiter: Limiter::new(sample_rate),
        }
    }

    fn stages_mut(&mut self) -> [&mut dyn Dynamics; 2] {
        [&mut self.compressor, &mut self.limiter]
    }

    /// Run every enabled stage; returns the gain reduction each one applied
    fn process(&mut self, left: &mut [f32], right: &mut [f32]) -> [f32; 2] {
        let mut reduction = [0.0; 2];
        for (amount, stage) in reduction.iter_mut().zip(self.stages_mut()) {
            if stage.is_enabled() {
                stage.process_stereo(left, right);
                *amount = stage.gain_reduction_db();
            }
        }
        reduction
    }

    fn reset(&mut self) {
        for stage in self.stages_mut() {
            stage.reset();
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        for stage in self.stages_mut() {
            stage.set_sample_rate(sample_rate);
        }
    }
}

/// The complete four-band processor
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    crossover: CrossoverNetwork,
    strips: [BandStrip; BAND_COUNT],
    delay: DelayLine,
    bypass: bool,
    stats: ProcessingStatistics,
    input: [Vec<f32>; CHANNELS],
    bands: [BandBuffers; CHANNELS],
    mix: [Vec<f32>; CHANNELS],
}

impl Pipeline {
    /// Create a pipeline with default processor settings
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_settings(config, &ProcessorSettings::default())
    }

    pub fn with_settings(config: PipelineConfig, settings: &ProcessorSettings) -> Result<Self> {
        config.validate()?;
        let sample_rate = config.sample_rate().as_f32();
        let frames = config.block_frames;

        let mut pipeline = Self {
            crossover: CrossoverNetwork::new(sample_rate),
            strips: std::array::from_fn(|_| BandStrip::new(sample_rate)),
            delay: DelayLine::new(sample_rate, config.max_delay_ms),
            bypass: false,
            stats: ProcessingStatistics::default(),
            input: std::array::from_fn(|_| vec![0.0; frames]),
            bands: std::array::from_fn(|_| BandBuffers::new(frames)),
            mix: std::array::from_fn(|_| vec![0.0; frames]),
            config,
        };
        pipeline.apply_settings(settings);

        info!(
            sample_rate = pipeline.config.sample_rate_hz,
            block_frames = frames,
            max_delay_ms = pipeline.config.max_delay_ms,
            "Pipeline created"
        );
        Ok(pipeline)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.config.sample_rate()
    }

    /// Reconfigure every stage for a new sample rate
    ///
    /// The caller stops the audio transfer around this call. Filter,
    /// envelope and delay state is cleared.
    pub fn set_sample_rate(&mut self, sample_rate: SampleRate) -> Result<()> {
        sample_rate.validate()?;
        let hz = sample_rate.as_f32();

        self.config.sample_rate_hz = sample_rate.hz();
        self.crossover.set_sample_rate(hz);
        for strip in &mut self.strips {
            strip.set_sample_rate(hz);
        }
        self.delay.set_sample_rate(hz);
        self.reset();

        info!(sample_rate = sample_rate.hz(), "Sample rate changed");
        Ok(())
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
        debug!(bypass, "Bypass toggled");
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    pub fn crossover(&self) -> &CrossoverNetwork {
        &self.crossover
    }

    pub fn crossover_mut(&mut self) -> &mut CrossoverNetwork {
        &mut self.crossover
    }

    pub fn strip(&self, band: Band) -> &BandStrip {
        &self.strips[band.index()]
    }

    pub fn compressor_mut(&mut self, band: Band) -> &mut Compressor {
        &mut self.strips[band.index()].compressor
    }

    pub fn limiter_mut(&mut self, band: Band) -> &mut Limiter {
        &mut self.strips[band.index()].limiter
    }

    pub fn delay(&self) -> &DelayLine {
        &self.delay
    }

    pub fn delay_mut(&mut self) -> &mut DelayLine {
        &mut self.delay
    }

    /// Push a complete settings record into every component
    pub fn apply_settings(&mut self, settings: &ProcessorSettings) {
        self.crossover.set_settings(&settings.crossover);
        for band in Band::ALL {
            let strip = &mut self.strips[band.index()];
            strip.compressor.set_params(settings.compressor[band.index()]);
            strip.limiter.set_params(settings.limiter[band.index()]);
        }
        self.delay.set_settings(&settings.delay);
        debug!("Processor settings applied");
    }

    /// Read back the current settings of every component
    pub fn settings(&self) -> ProcessorSettings {
        ProcessorSettings {
            crossover: self.crossover.settings(),
            compressor: std::array::from_fn(|band| self.strips[band].compressor.params()),
            limiter: std::array::from_fn(|band| self.strips[band].limiter.params()),
            delay: self.delay.settings(),
        }
    }

    pub fn statistics(&self) -> &ProcessingStatistics {
        &self.stats
    }

    /// Band buffers of the last processed block, after dynamics and delay
    pub fn band_buffers(&self, channel: Channel) -> &BandBuffers {
        &self.bands[channel.index()]
    }

    /// Clear filter, envelope and delay state and the statistics
    pub fn reset(&mut self) {
        self.crossover.reset();
        for strip in &mut self.strips {
            strip.reset();
        }
        self.delay.reset();
        for bands in &mut self.bands {
            bands.clear();
        }
        self.stats = ProcessingStatistics::default();
    }

    /// Process one interleaved stereo block
    ///
    /// `min(input.len(), output.len()) / 2` frames are processed. Blocks
    /// longer than the configured size are accepted but grow the working
    /// buffers.
    pub fn process_block(&mut self, input: &[i16], output: &mut [i16]) {
        let started = Instant::now();
        let frames = input.len().min(output.len()) / CHANNELS;
        let samples = frames * CHANNELS;
        self.ensure_capacity(frames);

        let [in_left, in_right] = &mut self.input;
        let (in_left, in_right) = (&mut in_left[..frames], &mut in_right[..frames]);
        deinterleave(&input[..samples], in_left, in_right);
        let input_peaks = [peak_level(in_left), peak_level(in_right)];
        self.stats.update_input(input_peaks);

        if self.bypass {
            output[..samples].copy_from_slice(&input[..samples]);
            self.stats.update_output(input_peaks);
            self.stats.finish_block(0, started.elapsed());
            return;
        }

        self.crossover.process_block(Channel::Left, in_left, &mut self.bands[0]);
        self.crossover.process_block(Channel::Right, in_right, &mut self.bands[1]);

        let [left, right] = &mut self.bands;
        for band in Band::ALL {
            if self.crossover.is_muted(band) {
                self.delay.skip_band(band, frames);
                self.stats.update_band(band, [0.0; CHANNELS]);
                self.stats.record_gain_reduction(band, [0.0; 2]);
                continue;
            }

            let (band_left, band_right) = (left.band_mut(band), right.band_mut(band));
            self.stats.update_band(band, [peak_level(band_left), peak_level(band_right)]);

            let reduction = self.strips[band.index()].process(band_left, band_right);
            self.stats.record_gain_reduction(band, reduction);

            self.delay.process_band(band, band_left, band_right);
        }
        self.delay.advance(frames);

        let [mix_left, mix_right] = &mut self.mix;
        let (mix_left, mix_right) = (&mut mix_left[..frames], &mut mix_right[..frames]);
        sum_bands(left, mix_left);
        sum_bands(right, mix_right);
        self.stats.update_output([peak_level(mix_left), peak_level(mix_right)]);

        let clipped = interleave(mix_left, mix_right, &mut output[..samples]);
        self.stats.finish_block(clipped, started.elapsed());
    }

    fn ensure_capacity(&mut self, frames: usize) {
        if frames <= self.input[0].len() {
            return;
        }
        warn!(
            frames,
            configured = self.config.block_frames,
            "Block larger than configured, growing buffers"
        );
        for buffer in self.input.iter_mut().chain(self.mix.iter_mut()) {
            buffer.resize(frames, 0.0);
        }
    }
}

fn sum_bands(bands: &BandBuffers, mix: &mut [f32]) {
    mix.fill(0.0);
    for band in Band::ALL {
        for (out, &sample) in mix.iter_mut().zip(bands.band(band)) {
            *out += sample;
        }
    }
}

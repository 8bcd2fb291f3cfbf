//! Digital Signal Processing primitives for the band-splitting core
//!
//! This module provides:
//! - Biquad sections and cascaded filter chains (Butterworth / Linkwitz-Riley)
//! - Compressor and limiter dynamics stages
//!
//! All processors are designed for:
//! - Zero allocations in the hot path
//! - Coefficients recomputed only at the settings boundary
//! - Stable, finite output for any clamped parameter set

pub mod biquad;
pub mod dynamics;

pub use biquad::{
    butterworth_q, BiquadCoeffs, BiquadFilter, FilterAlignment, FilterChain, FilterKind,
    FilterOrder, LINKWITZ_RILEY_Q, MAX_STAGES,
};
pub use dynamics::{Compressor, CompressorParams, DynamicsState, Limiter, LimiterParams};

use tracing::warn;

/// Parameter constraints for DSP stages
///
/// All parameters are clamped to these ranges to prevent
/// invalid states and ensure numerical stability.
pub mod params {
    /// Linear level floor applied before any dB conversion (-100 dB)
    pub const LEVEL_FLOOR: f32 = 1e-5;
    pub const LEVEL_FLOOR_DB: f32 = -100.0;

    /// Smallest gain factor a dynamics stage may apply
    pub const GAIN_FLOOR: f32 = 0.001;

    /// Crossover cutoff range; the upper bound is a fraction of the sample rate
    pub const CUTOFF_MIN_HZ: f32 = 20.0;
    pub const CUTOFF_MAX_RATIO: f32 = 0.45;

    /// Per-band gain range in dB
    pub const BAND_GAIN_MIN_DB: f32 = -24.0;
    pub const BAND_GAIN_MAX_DB: f32 = 12.0;

    /// Compressor / limiter threshold range in dB
    pub const THRESHOLD_MIN_DB: f32 = -60.0;
    pub const THRESHOLD_MAX_DB: f32 = 0.0;

    /// Compressor ratio range (1:1 to 20:1)
    pub const RATIO_MIN: f32 = 1.0;
    pub const RATIO_MAX: f32 = 20.0;

    /// Attack/Release time ranges in milliseconds
    pub const ATTACK_MIN_MS: f32 = 0.1;
    pub const ATTACK_MAX_MS: f32 = 100.0;
    pub const RELEASE_MIN_MS: f32 = 10.0;
    pub const RELEASE_MAX_MS: f32 = 1000.0;

    /// Make-up gain and knee width in dB
    pub const MAKEUP_MAX_DB: f32 = 24.0;
    pub const KNEE_MAX_DB: f32 = 24.0;

    /// Longest per-band alignment delay
    pub const MAX_DELAY_MS: f32 = 100.0;
}

/// Convert decibels to a linear gain factor
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert a linear level to decibels, floored at [`params::LEVEL_FLOOR`]
#[inline]
pub fn linear_to_db(level: f32) -> f32 {
    20.0 * level.max(params::LEVEL_FLOOR).log10()
}

/// One-pole smoothing coefficient for a time constant in milliseconds
///
/// A non-positive time yields `0.0`, i.e. the follower jumps straight to its target.
#[inline]
pub fn time_constant_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    if time_ms <= 0.0 {
        0.0
    } else {
        (-1.0 / ((time_ms / 1000.0) * sample_rate)).exp()
    }
}

/// Clamp a parameter into range, logging when the request had to be adjusted
///
/// NaN requests snap to `min`.
pub(crate) fn clamp_param(name: &str, value: f32, min: f32, max: f32) -> f32 {
    let clamped = if value.is_nan() { min } else { value.clamp(min, max) };
    if clamped != value {
        warn!(param = name, requested = value, applied = clamped, "Parameter clamped");
    }
    clamped
}

/// Gain-reduction stage driven by a level detector
///
/// Implementors only provide the gain computer; buffer handling, stereo
/// linking and the enabled check live in the provided methods so every
/// stage shares one per-sample path.
pub trait Dynamics: Send {
    /// Feed one detector level (absolute linear sample) and return the
    /// smoothed gain factor to apply, excluding make-up gain.
    fn compute_gain(&mut self, level: f32) -> f32;

    /// Linear gain applied after gain reduction
    fn makeup(&self) -> f32 {
        1.0
    }

    /// Clear envelope and gain state
    fn reset(&mut self);

    /// Recompute time-constant coefficients for a new sample rate
    fn set_sample_rate(&mut self, sample_rate: f32);

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    /// Current gain reduction as a positive dB amount
    fn gain_reduction_db(&self) -> f32;

    /// Stage name for debugging/display
    fn name(&self) -> &str;

    /// Process a single sample
    #[inline]
    fn process_sample(&mut self, sample: f32) -> f32 {
        if !self.is_enabled() {
            return sample;
        }
        sample * self.compute_gain(sample.abs()) * self.makeup()
    }

    /// Process a mono buffer in-place
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.is_enabled() {
            return;
        }
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Process from `input` into `output`; a disabled stage copies
    fn process_into(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &sample) in output.iter_mut().zip(input) {
            *out = self.process_sample(sample);
        }
    }

    /// Process a stereo pair with linked detection
    ///
    /// The detector sees `max(|L|, |R|)` and the same gain is applied to both
    /// sides, so the stereo image does not shift under gain reduction.
    fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        if !self.is_enabled() {
            return;
        }
        let makeup = self.makeup();
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let gain = self.compute_gain(l.abs().max(r.abs())) * makeup;
            *l *= gain;
            *r *= gain;
        }
    }
}

//! Compressor and limiter stages
//!
//! Both share the same detector: a peak-held absolute level converted to dB,
//! an asymmetric envelope follower in the dB domain, a static gain curve and a
//! second smoother on the applied gain.

use super::{clamp_param, db_to_linear, linear_to_db, params, time_constant_coeff, Dynamics};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Detector and gain state of one dynamics stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicsState {
    /// Envelope level in dB
    pub envelope_db: f32,
    /// Applied gain factor, 1.0 = no reduction
    pub gain: f32,
    /// Absolute value of the previous detector sample
    pub prev_abs: f32,
}

impl Default for DynamicsState {
    fn default() -> Self {
        Self {
            envelope_db: params::LEVEL_FLOOR_DB,
            gain: 1.0,
            prev_abs: 0.0,
        }
    }
}

impl DynamicsState {
    /// Two-sample peak hold, returned in dB
    #[inline]
    fn detect_db(&mut self, level: f32) -> f32 {
        let peak = level.max(self.prev_abs);
        self.prev_abs = level;
        linear_to_db(peak)
    }

    fn reduction_db(&self) -> f32 {
        (-linear_to_db(self.gain)).max(0.0)
    }
}

// ============================================================================
// COMPRESSOR
// ============================================================================

/// Compressor parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorParams {
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub makeup_gain_db: f32,
    /// Soft-knee width centred on the threshold; 0 = hard knee
    pub knee_width_db: f32,
    pub enabled: bool,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_db: -20.0,
            ratio: 4.0,
            attack_ms: 5.0,
            release_ms: 100.0,
            makeup_gain_db: 0.0,
            knee_width_db: 3.0,
            enabled: true,
        }
    }
}

/// Feed-forward compressor with soft knee
#[derive(Debug, Clone)]
pub struct Compressor {
    params: CompressorParams,
    sample_rate: f32,
    attack_coeff: f32,
    release_coeff: f32,
    makeup_linear: f32,
    state: DynamicsState,
}

impl Compressor {
    /// Create a compressor with default settings
    pub fn new(sample_rate: f32) -> Self {
        Self::with_params(CompressorParams::default(), sample_rate)
    }

    pub fn with_params(params: CompressorParams, sample_rate: f32) -> Self {
        let mut compressor = Self {
            params,
            sample_rate,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            makeup_linear: 1.0,
            state: DynamicsState::default(),
        };
        compressor.set_params(params);
        compressor
    }

    /// Set the threshold in dB
    pub fn set_threshold(&mut self, threshold_db: f32) {
        self.params.threshold_db = clamp_param(
            "compressor.threshold_db",
            threshold_db,
            params::THRESHOLD_MIN_DB,
            params::THRESHOLD_MAX_DB,
        );
    }

    /// Set the compression ratio (N:1)
    pub fn set_ratio(&mut self, ratio: f32) {
        self.params.ratio =
            clamp_param("compressor.ratio", ratio, params::RATIO_MIN, params::RATIO_MAX);
    }

    /// Set the attack time in milliseconds
    pub fn set_attack_ms(&mut self, attack_ms: f32) {
        self.params.attack_ms = clamp_param(
            "compressor.attack_ms",
            attack_ms,
            params::ATTACK_MIN_MS,
            params::ATTACK_MAX_MS,
        );
        self.update_coefficients();
    }

    /// Set the release time in milliseconds
    pub fn set_release_ms(&mut self, release_ms: f32) {
        self.params.release_ms = clamp_param(
            "compressor.release_ms",
            release_ms,
            params::RELEASE_MIN_MS,
            params::RELEASE_MAX_MS,
        );
        self.update_coefficients();
    }

    /// Set the make-up gain in dB
    pub fn set_makeup_gain(&mut self, gain_db: f32) {
        self.params.makeup_gain_db =
            clamp_param("compressor.makeup_gain_db", gain_db, 0.0, params::MAKEUP_MAX_DB);
        self.makeup_linear = db_to_linear(self.params.makeup_gain_db);
    }

    /// Set the knee width in dB (0 = hard knee)
    pub fn set_knee_width(&mut self, knee_db: f32) {
        self.params.knee_width_db =
            clamp_param("compressor.knee_width_db", knee_db, 0.0, params::KNEE_MAX_DB);
    }

    /// Get current parameter values
    pub fn params(&self) -> CompressorParams {
        self.params
    }

    /// Set all parameters at once
    pub fn set_params(&mut self, params: CompressorParams) {
        self.params.enabled = params.enabled;
        self.set_threshold(params.threshold_db);
        self.set_ratio(params.ratio);
        self.set_attack_ms(params.attack_ms);
        self.set_release_ms(params.release_ms);
        self.set_makeup_gain(params.makeup_gain_db);
        self.set_knee_width(params.knee_width_db);
        trace!(
            threshold_db = self.params.threshold_db,
            ratio = self.params.ratio,
            knee_db = self.params.knee_width_db,
            enabled = self.params.enabled,
            "Compressor updated"
        );
    }

    pub fn state(&self) -> &DynamicsState {
        &self.state
    }

    /// Static gain curve: gain change in dB (<= 0) for an envelope level
    pub fn static_gain_db(&self, level_db: f32) -> f32 {
        let over = level_db - self.params.threshold_db;
        let knee = self.params.knee_width_db;
        let slope = 1.0 / self.params.ratio - 1.0;

        if knee > 0.0 && over.abs() <= knee / 2.0 {
            let x = over + knee / 2.0;
            slope * x * x / (2.0 * knee)
        } else if over > 0.0 {
            slope * over
        } else {
            0.0
        }
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = time_constant_coeff(self.params.attack_ms, self.sample_rate);
        self.release_coeff = time_constant_coeff(self.params.release_ms, self.sample_rate);
    }
}

impl Dynamics for Compressor {
    #[inline]
    fn compute_gain(&mut self, level: f32) -> f32 {
        let level_db = self.state.detect_db(level);

        let env_coeff = if level_db > self.state.envelope_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.state.envelope_db = env_coeff * self.state.envelope_db + (1.0 - env_coeff) * level_db;

        let target = db_to_linear(self.static_gain_db(self.state.envelope_db)).max(params::GAIN_FLOOR);

        // Decreasing gain follows attack, recovering gain follows release
        let gain_coeff = if target < self.state.gain {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.state.gain = gain_coeff * self.state.gain + (1.0 - gain_coeff) * target;
        self.state.gain
    }

    fn makeup(&self) -> f32 {
        self.makeup_linear
    }

    fn reset(&mut self) {
        self.state = DynamicsState::default();
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    fn is_enabled(&self) -> bool {
        self.params.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.params.enabled = enabled;
        if !enabled {
            self.reset();
        }
    }

    fn gain_reduction_db(&self) -> f32 {
        self.state.reduction_db()
    }

    fn name(&self) -> &str {
        "Compressor"
    }
}

// ============================================================================
// LIMITER
// ============================================================================

/// Limiter parameters
///
/// Attack is not configurable: the envelope follows rising peaks immediately.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterParams {
    pub threshold_db: f32,
    pub release_ms: f32,
    pub enabled: bool,
}

impl Default for LimiterParams {
    fn default() -> Self {
        Self {
            threshold_db: -3.0,
            release_ms: 50.0,
            enabled: true,
        }
    }
}

/// Hard-knee peak limiter
#[derive(Debug, Clone)]
pub struct Limiter {
    params: LimiterParams,
    sample_rate: f32,
    release_coeff: f32,
    state: DynamicsState,
}

impl Limiter {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_params(LimiterParams::default(), sample_rate)
    }

    pub fn with_params(params: LimiterParams, sample_rate: f32) -> Self {
        let mut limiter = Self {
            params,
            sample_rate,
            release_coeff: 0.0,
            state: DynamicsState::default(),
        };
        limiter.set_params(params);
        limiter
    }

    /// Set the ceiling in dB
    pub fn set_threshold(&mut self, threshold_db: f32) {
        self.params.threshold_db = clamp_param(
            "limiter.threshold_db",
            threshold_db,
            params::THRESHOLD_MIN_DB,
            params::THRESHOLD_MAX_DB,
        );
    }

    /// Set the release time in milliseconds
    pub fn set_release_ms(&mut self, release_ms: f32) {
        self.params.release_ms = clamp_param(
            "limiter.release_ms",
            release_ms,
            params::RELEASE_MIN_MS,
            params::RELEASE_MAX_MS,
        );
        self.release_coeff = time_constant_coeff(self.params.release_ms, self.sample_rate);
    }

    pub fn params(&self) -> LimiterParams {
        self.params
    }

    pub fn set_params(&mut self, params: LimiterParams) {
        self.params.enabled = params.enabled;
        self.set_threshold(params.threshold_db);
        self.set_release_ms(params.release_ms);
        trace!(
            threshold_db = self.params.threshold_db,
            release_ms = self.params.release_ms,
            enabled = self.params.enabled,
            "Limiter updated"
        );
    }

    pub fn state(&self) -> &DynamicsState {
        &self.state
    }
}

impl Dynamics for Limiter {
    #[inline]
    fn compute_gain(&mut self, level: f32) -> f32 {
        let level_db = self.state.detect_db(level);
        let release = self.release_coeff;

        self.state.envelope_db = if level_db > self.state.envelope_db {
            level_db
        } else {
            release * self.state.envelope_db + (1.0 - release) * level_db
        };

        let reduction_db = if self.state.envelope_db > self.params.threshold_db {
            self.params.threshold_db - self.state.envelope_db
        } else {
            0.0
        };
        let target = db_to_linear(reduction_db).max(params::GAIN_FLOOR);

        self.state.gain = if target < self.state.gain {
            target
        } else {
            release * self.state.gain + (1.0 - release) * target
        };
        self.state.gain
    }

    fn reset(&mut self) {
        self.state = DynamicsState::default();
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.release_coeff = time_constant_coeff(self.params.release_ms, sample_rate);
    }

    fn is_enabled(&self) -> bool {
        self.params.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.params.enabled = enabled;
        if !enabled {
            self.reset();
        }
    }

    fn gain_reduction_db(&self) -> f32 {
        self.state.reduction_db()
    }

    fn name(&self) -> &str {
        "Limiter"
    }
}

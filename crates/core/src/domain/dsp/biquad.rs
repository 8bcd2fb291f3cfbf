//! Biquad sections and the cascades built from them

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Q used by every stage of a Linkwitz-Riley cascade
pub const LINKWITZ_RILEY_Q: f32 = 0.7071;

/// Most sections a single chain can hold (8th order)
pub const MAX_STAGES: usize = 4;

const BUTTERWORTH_Q_2: [f32; 1] = [0.7071];
const BUTTERWORTH_Q_4: [f32; 2] = [0.5412, 1.3066];
const BUTTERWORTH_Q_8: [f32; 4] = [0.5098, 0.6013, 0.9000, 2.5629];

/// Per-stage Q values of a Butterworth cascade
pub fn butterworth_q(order: FilterOrder) -> &'static [f32] {
    match order {
        FilterOrder::Second => &BUTTERWORTH_Q_2,
        FilterOrder::Fourth => &BUTTERWORTH_Q_4,
        FilterOrder::Eighth => &BUTTERWORTH_Q_8,
    }
}

/// Low-pass or high-pass leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    LowPass,
    HighPass,
}

/// Crossover alignment shared by all chains of a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterAlignment {
    Butterworth,
    #[default]
    LinkwitzRiley,
}

impl FilterAlignment {
    pub fn name(&self) -> &'static str {
        match self {
            FilterAlignment::Butterworth => "Butterworth",
            FilterAlignment::LinkwitzRiley => "Linkwitz-Riley",
        }
    }
}

/// Slope of every chain, in filter order (2, 4 or 8)
///
/// Serialized as the plain order number; any other number is snapped to
/// the nearest supported order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum FilterOrder {
    Second,
    #[default]
    Fourth,
    Eighth,
}

impl FilterOrder {
    pub fn order(self) -> u8 {
        match self {
            FilterOrder::Second => 2,
            FilterOrder::Fourth => 4,
            FilterOrder::Eighth => 8,
        }
    }

    /// Number of biquad sections per chain
    pub fn stages(self) -> usize {
        usize::from(self.order() / 2)
    }
}

impl From<u8> for FilterOrder {
    fn from(order: u8) -> Self {
        match order {
            0..=3 => FilterOrder::Second,
            4..=6 => FilterOrder::Fourth,
            _ => FilterOrder::Eighth,
        }
    }
}

impl From<FilterOrder> for u8 {
    fn from(order: FilterOrder) -> Self {
        order.order()
    }
}

// ============================================================================
// BIQUAD COEFFICIENTS
// ============================================================================

/// Normalized biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    /// Design a second-order low-pass or high-pass section
    ///
    /// # Parameters
    /// - `sample_rate`: Audio sample rate in Hz
    /// - `freq`: Cutoff frequency in Hz, `0 < freq < sample_rate / 2`
    /// - `q`: Quality factor of this section
    #[must_use]
    pub fn design(kind: FilterKind, sample_rate: f32, freq: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * f64::from(freq) / f64::from(sample_rate);
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * f64::from(q));

        let (b0, b1, b2) = match kind {
            FilterKind::LowPass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterKind::HighPass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -(1.0 + cos_w0), b0)
            }
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        // Normalize by a0
        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }

    #[must_use]
    pub fn lowpass(sample_rate: f32, freq: f32, q: f32) -> Self {
        Self::design(FilterKind::LowPass, sample_rate, freq, q)
    }

    #[must_use]
    pub fn highpass(sample_rate: f32, freq: f32, q: f32) -> Self {
        Self::design(FilterKind::HighPass, sample_rate, freq, q)
    }

    /// Complex frequency response at `freq` Hz
    pub fn response(&self, freq: f32, sample_rate: f32) -> Complex64 {
        let w = 2.0 * PI * f64::from(freq) / f64::from(sample_rate);
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let num = Complex64::from(f64::from(self.b0))
            + z1 * f64::from(self.b1)
            + z2 * f64::from(self.b2);
        let den = Complex64::from(1.0) + z1 * f64::from(self.a1) + z2 * f64::from(self.a2);
        num / den
    }
}

// ============================================================================
// BIQUAD FILTER (Direct Form II)
// ============================================================================

/// Single biquad section with two state registers
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    s1: f32,
    s2: f32,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            s1: 0.0,
            s2: 0.0,
        }
    }

    /// Replace coefficients; state is cleared so old history never meets new coefficients
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
        self.reset();
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let w = input - c.a1 * self.s1 - c.a2 * self.s2;
        let output = c.b0 * w + c.b1 * self.s1 + c.b2 * self.s2;
        self.s2 = self.s1;
        self.s1 = w;
        output
    }

    /// Process a buffer in-place
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Reset filter state (clears history)
    pub fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }
}

// ============================================================================
// FILTER CHAIN
// ============================================================================

/// Cascade of 1-4 sections forming one low-pass or high-pass leg
#[derive(Debug, Clone)]
pub struct FilterChain {
    kind: FilterKind,
    stages: [BiquadFilter; MAX_STAGES],
    active: usize,
}

impl FilterChain {
    /// Create an empty chain; it passes audio through until designed
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            stages: [BiquadFilter::default(); MAX_STAGES],
            active: 0,
        }
    }

    /// Rebuild every section for the given alignment, order and cutoff
    ///
    /// All sections are recomputed together and their state cleared.
    pub fn design(
        &mut self,
        alignment: FilterAlignment,
        order: FilterOrder,
        cutoff_hz: f32,
        sample_rate: f32,
    ) {
        self.active = order.stages();
        for (index, stage) in self.stages.iter_mut().enumerate() {
            if index < self.active {
                let q = match alignment {
                    FilterAlignment::Butterworth => butterworth_q(order)[index],
                    FilterAlignment::LinkwitzRiley => LINKWITZ_RILEY_Q,
                };
                stage.set_coeffs(BiquadCoeffs::design(self.kind, sample_rate, cutoff_hz, q));
            } else {
                stage.set_coeffs(BiquadCoeffs::default());
            }
        }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Number of sections in use
    pub fn stage_count(&self) -> usize {
        self.active
    }

    pub fn stages(&self) -> &[BiquadFilter] {
        &self.stages[..self.active]
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        self.stages[..self.active]
            .iter_mut()
            .fold(input, |sample, stage| stage.process_sample(sample))
    }

    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Complex response of the whole cascade
    pub fn response(&self, freq: f32, sample_rate: f32) -> Complex64 {
        self.stages()
            .iter()
            .fold(Complex64::from(1.0), |acc, stage| {
                acc * stage.coeffs().response(freq, sample_rate)
            })
    }
}

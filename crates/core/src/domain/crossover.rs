//! Four-band crossover network
//!
//! One mono input per channel is split into four bands by six filter chains:
//!
//! ```text
//! sub  = LP(low)
//! low  = LP(mid)  . HP(low)
//! mid  = LP(high) . HP(mid)
//! high = HP(high)
//! ```
//!
//! Band gain and mute are applied at the output of the network. Every
//! settings change rebuilds all chains of both channels in one step and
//! clears their state.

use crate::domain::audio::{Channel, CHANNELS};
use crate::domain::dsp::{
    clamp_param, db_to_linear, params, FilterAlignment, FilterChain, FilterKind, FilterOrder,
};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Number of output bands
pub const BAND_COUNT: usize = 4;

/// Number of crossover points
pub const CROSSOVER_POINTS: usize = BAND_COUNT - 1;

/// Output band of the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Sub,
    Low,
    Mid,
    High,
}

impl Band {
    pub const ALL: [Band; BAND_COUNT] = [Band::Sub, Band::Low, Band::Mid, Band::High];

    pub fn index(self) -> usize {
        match self {
            Band::Sub => 0,
            Band::Low => 1,
            Band::Mid => 2,
            Band::High => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Band::Sub => "sub",
            Band::Low => "low",
            Band::Mid => "mid",
            Band::High => "high",
        }
    }
}

/// Crossover point between two adjacent bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossoverPoint {
    /// Sub / low split
    Low,
    /// Low / mid split
    Mid,
    /// Mid / high split
    High,
}

impl CrossoverPoint {
    pub fn index(self) -> usize {
        match self {
            CrossoverPoint::Low => 0,
            CrossoverPoint::Mid => 1,
            CrossoverPoint::High => 2,
        }
    }
}

/// Crossover settings record exchanged with the configuration layer
///
/// `low_cutoff_hz < mid_cutoff_hz < high_cutoff_hz` must hold; the network
/// logs but does not repair a violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverSettings {
    pub low_cutoff_hz: f32,
    pub mid_cutoff_hz: f32,
    pub high_cutoff_hz: f32,
    pub alignment: FilterAlignment,
    pub order: FilterOrder,
    /// Band gains in dB, sub to high
    pub gain_db: [f32; BAND_COUNT],
    pub mute: [bool; BAND_COUNT],
}

impl Default for CrossoverSettings {
    fn default() -> Self {
        Self {
            low_cutoff_hz: 100.0,
            mid_cutoff_hz: 1000.0,
            high_cutoff_hz: 8000.0,
            alignment: FilterAlignment::LinkwitzRiley,
            order: FilterOrder::Fourth,
            gain_db: [0.0; BAND_COUNT],
            mute: [false; BAND_COUNT],
        }
    }
}

impl CrossoverSettings {
    pub fn cutoffs(&self) -> [f32; CROSSOVER_POINTS] {
        [self.low_cutoff_hz, self.mid_cutoff_hz, self.high_cutoff_hz]
    }

    /// True when the cutoffs are strictly ascending
    pub fn is_ordered(&self) -> bool {
        self.low_cutoff_hz < self.mid_cutoff_hz && self.mid_cutoff_hz < self.high_cutoff_hz
    }
}

/// One output sample per band
pub type BandSamples = [f32; BAND_COUNT];

/// Per-band working buffers of one channel
#[derive(Debug, Clone)]
pub struct BandBuffers {
    bands: [Vec<f32>; BAND_COUNT],
    frames: usize,
}

impl BandBuffers {
    pub fn new(frames: usize) -> Self {
        Self {
            bands: std::array::from_fn(|_| vec![0.0; frames]),
            frames,
        }
    }

    /// Frames written by the last block
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn band(&self, band: Band) -> &[f32] {
        &self.bands[band.index()][..self.frames]
    }

    pub fn band_mut(&mut self, band: Band) -> &mut [f32] {
        &mut self.bands[band.index()][..self.frames]
    }

    /// Size the buffers for the next block; only grows
    pub fn prepare(&mut self, frames: usize) {
        for band in &mut self.bands {
            if band.len() < frames {
                band.resize(frames, 0.0);
            }
        }
        self.frames = frames;
    }

    pub fn clear(&mut self) {
        for band in &mut self.bands {
            band.fill(0.0);
        }
    }
}

// Leg layout inside a channel, with the crossover point each leg is tuned to
const SUB_LP: usize = 0;
const LOW_HP: usize = 1;
const LOW_LP: usize = 2;
const MID_HP: usize = 3;
const MID_LP: usize = 4;
const HIGH_HP: usize = 5;
const LEGS: usize = 6;
const LEG_CUTOFF: [usize; LEGS] = [0, 0, 1, 1, 2, 2];

/// Six filter chains of one channel
#[derive(Debug, Clone)]
struct ChannelFilters {
    legs: [FilterChain; LEGS],
}

impl ChannelFilters {
    fn new() -> Self {
        Self {
            legs: [
                FilterChain::new(FilterKind::LowPass),
                FilterChain::new(FilterKind::HighPass),
                FilterChain::new(FilterKind::LowPass),
                FilterChain::new(FilterKind::HighPass),
                FilterChain::new(FilterKind::LowPass),
                FilterChain::new(FilterKind::HighPass),
            ],
        }
    }

    fn design(
        &mut self,
        alignment: FilterAlignment,
        order: FilterOrder,
        cutoffs: &[f32; CROSSOVER_POINTS],
        sample_rate: f32,
    ) {
        for (leg, chain) in self.legs.iter_mut().enumerate() {
            chain.design(alignment, order, cutoffs[LEG_CUTOFF[leg]], sample_rate);
        }
    }

    #[inline]
    fn split(&mut self, input: f32) -> BandSamples {
        let sub = self.legs[SUB_LP].process_sample(input);
        let low_hp = self.legs[LOW_HP].process_sample(input);
        let low = self.legs[LOW_LP].process_sample(low_hp);
        let mid_hp = self.legs[MID_HP].process_sample(input);
        let mid = self.legs[MID_LP].process_sample(mid_hp);
        let high = self.legs[HIGH_HP].process_sample(input);
        [sub, low, mid, high]
    }

    fn reset(&mut self) {
        for chain in &mut self.legs {
            chain.reset();
        }
    }

    fn response(&self, band: Band, freq: f32, sample_rate: f32) -> Complex64 {
        let leg = |index: usize| self.legs[index].response(freq, sample_rate);
        match band {
            Band::Sub => leg(SUB_LP),
            Band::Low => leg(LOW_HP) * leg(LOW_LP),
            Band::Mid => leg(MID_HP) * leg(MID_LP),
            Band::High => leg(HIGH_HP),
        }
    }
}

/// Four-band crossover with per-band gain and mute
///
/// Holds independent filter state for each stereo channel; both share one
/// set of settings.
#[derive(Debug, Clone)]
pub struct CrossoverNetwork {
    sample_rate: f32,
    cutoffs: [f32; CROSSOVER_POINTS],
    alignment: FilterAlignment,
    order: FilterOrder,
    gain_db: [f32; BAND_COUNT],
    gain: [f32; BAND_COUNT],
    mute: [bool; BAND_COUNT],
    channels: [ChannelFilters; CHANNELS],
}

impl CrossoverNetwork {
    /// Create a network with default settings
    pub fn new(sample_rate: f32) -> Self {
        Self::with_settings(&CrossoverSettings::default(), sample_rate)
    }

    pub fn with_settings(settings: &CrossoverSettings, sample_rate: f32) -> Self {
        let mut network = Self {
            sample_rate,
            cutoffs: settings.cutoffs(),
            alignment: settings.alignment,
            order: settings.order,
            gain_db: [0.0; BAND_COUNT],
            gain: [1.0; BAND_COUNT],
            mute: [false; BAND_COUNT],
            channels: [ChannelFilters::new(), ChannelFilters::new()],
        };
        network.set_settings(settings);
        network
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Change the sample rate; cutoffs are re-clamped to the new Nyquist range
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for index in 0..CROSSOVER_POINTS {
            self.cutoffs[index] = self.clamp_cutoff(self.cutoffs[index]);
        }
        self.recompute();
    }

    pub fn set_cutoff(&mut self, point: CrossoverPoint, cutoff_hz: f32) {
        self.cutoffs[point.index()] = self.clamp_cutoff(cutoff_hz);
        self.check_ordering();
        self.recompute();
    }

    pub fn cutoff(&self, point: CrossoverPoint) -> f32 {
        self.cutoffs[point.index()]
    }

    pub fn cutoffs(&self) -> [f32; CROSSOVER_POINTS] {
        self.cutoffs
    }

    pub fn set_alignment(&mut self, alignment: FilterAlignment) {
        self.alignment = alignment;
        self.recompute();
    }

    pub fn alignment(&self) -> FilterAlignment {
        self.alignment
    }

    pub fn set_order(&mut self, order: FilterOrder) {
        self.order = order;
        self.recompute();
    }

    pub fn order(&self) -> FilterOrder {
        self.order
    }

    /// Set a band gain in dB; stored linear
    pub fn set_gain_db(&mut self, band: Band, gain_db: f32) {
        let gain_db = clamp_param(
            "crossover.gain_db",
            gain_db,
            params::BAND_GAIN_MIN_DB,
            params::BAND_GAIN_MAX_DB,
        );
        self.gain_db[band.index()] = gain_db;
        self.gain[band.index()] = db_to_linear(gain_db);
        trace!(band = band.name(), gain_db, "Band gain updated");
    }

    pub fn gain_db(&self, band: Band) -> f32 {
        self.gain_db[band.index()]
    }

    /// Linear gain applied to a band
    pub fn gain(&self, band: Band) -> f32 {
        self.gain[band.index()]
    }

    pub fn set_mute(&mut self, band: Band, mute: bool) {
        self.mute[band.index()] = mute;
        trace!(band = band.name(), mute, "Band mute updated");
    }

    pub fn is_muted(&self, band: Band) -> bool {
        self.mute[band.index()]
    }

    /// Current settings, gains in dB
    pub fn settings(&self) -> CrossoverSettings {
        CrossoverSettings {
            low_cutoff_hz: self.cutoffs[0],
            mid_cutoff_hz: self.cutoffs[1],
            high_cutoff_hz: self.cutoffs[2],
            alignment: self.alignment,
            order: self.order,
            gain_db: self.gain_db,
            mute: self.mute,
        }
    }

    /// Apply a complete settings record with a single coefficient rebuild
    pub fn set_settings(&mut self, settings: &CrossoverSettings) {
        for (index, cutoff) in settings.cutoffs().into_iter().enumerate() {
            self.cutoffs[index] = self.clamp_cutoff(cutoff);
        }
        self.alignment = settings.alignment;
        self.order = settings.order;
        for band in Band::ALL {
            self.set_gain_db(band, settings.gain_db[band.index()]);
            self.set_mute(band, settings.mute[band.index()]);
        }
        self.check_ordering();
        self.recompute();
    }

    /// Clear the filter history of both channels
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }

    /// Split one sample of `channel` into its four bands
    #[inline]
    pub fn process(&mut self, channel: Channel, input: f32) -> BandSamples {
        let split = self.channels[channel.index()].split(input);
        std::array::from_fn(|band| {
            if self.mute[band] {
                0.0
            } else {
                split[band] * self.gain[band]
            }
        })
    }

    /// Split a block of `channel` into `output`
    pub fn process_block(&mut self, channel: Channel, input: &[f32], output: &mut BandBuffers) {
        output.prepare(input.len());
        let filters = &mut self.channels[channel.index()];

        for (frame, &sample) in input.iter().enumerate() {
            let split = filters.split(sample);
            for (band, &value) in split.iter().enumerate() {
                output.bands[band][frame] = if self.mute[band] {
                    0.0
                } else {
                    value * self.gain[band]
                };
            }
        }
    }

    /// Complex response of one band including its gain and mute
    pub fn band_response(&self, band: Band, freq: f32) -> Complex64 {
        if self.mute[band.index()] {
            return Complex64::from(0.0);
        }
        self.channels[0].response(band, freq, self.sample_rate) * f64::from(self.gain[band.index()])
    }

    /// Complex response of all four bands summed
    pub fn summed_response(&self, freq: f32) -> Complex64 {
        Band::ALL
            .iter()
            .map(|&band| self.band_response(band, freq))
            .sum()
    }

    fn clamp_cutoff(&self, cutoff_hz: f32) -> f32 {
        clamp_param(
            "crossover.cutoff_hz",
            cutoff_hz,
            params::CUTOFF_MIN_HZ,
            self.sample_rate * params::CUTOFF_MAX_RATIO,
        )
    }

    fn check_ordering(&self) {
        let [low, mid, high] = self.cutoffs;
        if !(low < mid && mid < high) {
            warn!(low, mid, high, "Crossover cutoffs are not ascending");
        }
    }

    /// Rebuild every chain of both channels and clear their state
    fn recompute(&mut self) {
        for channel in &mut self.channels {
            channel.design(self.alignment, self.order, &self.cutoffs, self.sample_rate);
        }
        debug!(
            low = self.cutoffs[0],
            mid = self.cutoffs[1],
            high = self.cutoffs[2],
            alignment = self.alignment.name(),
            order = self.order.order(),
            "Crossover coefficients recomputed"
        );
    }
}

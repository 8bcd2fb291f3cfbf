//! Per-band alignment delay and polarity inversion
//!
//! Every band owns one circular buffer per channel. All rings share a single
//! write index; each band reads back from its own read index, which trails the
//! write index by the integer part of the band's delay.

use crate::domain::audio::CHANNELS;
use crate::domain::crossover::{Band, BAND_COUNT};
use crate::domain::dsp::{clamp_param, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Fractional remainders below this read the integer cell directly
const FRACTION_EPSILON: f32 = 0.001;

/// Delay and polarity settings record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelaySettings {
    /// Per-band delay in milliseconds, sub to high
    pub delay_ms: [f32; BAND_COUNT],
    pub phase_invert: [bool; BAND_COUNT],
}

impl Default for DelaySettings {
    fn default() -> Self {
        Self {
            delay_ms: [0.0; BAND_COUNT],
            phase_invert: [false; BAND_COUNT],
        }
    }
}

#[derive(Debug, Clone)]
struct BandDelay {
    rings: [Vec<f32>; CHANNELS],
    read_index: usize,
    delay_ms: f32,
    delay_samples: f32,
    invert: bool,
}

impl BandDelay {
    fn new(capacity: usize) -> Self {
        Self {
            rings: std::array::from_fn(|_| vec![0.0; capacity]),
            read_index: 0,
            delay_ms: 0.0,
            delay_samples: 0.0,
            invert: false,
        }
    }

    fn fraction(&self) -> f32 {
        self.delay_samples.fract()
    }
}

/// Fractional delay lines for all four bands
#[derive(Debug, Clone)]
pub struct DelayLine {
    bands: [BandDelay; BAND_COUNT],
    write_index: usize,
    capacity: usize,
    sample_rate: f32,
    max_delay_ms: f32,
}

impl DelayLine {
    /// Create delay lines able to hold `max_delay_ms` at `sample_rate`
    pub fn new(sample_rate: f32, max_delay_ms: f32) -> Self {
        let max_delay_ms = max_delay_ms.max(0.0);
        let capacity = Self::capacity_for(sample_rate, max_delay_ms);
        Self {
            bands: std::array::from_fn(|_| BandDelay::new(capacity)),
            write_index: 0,
            capacity,
            sample_rate,
            max_delay_ms,
        }
    }

    // Two spare cells keep the interpolation neighbour of the longest delay
    // from being the cell written in the same step.
    fn capacity_for(sample_rate: f32, max_delay_ms: f32) -> usize {
        (max_delay_ms * sample_rate / 1000.0).ceil() as usize + 2
    }

    /// Ring length in samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_delay_ms(&self) -> f32 {
        self.max_delay_ms
    }

    /// Set a band's delay in milliseconds
    ///
    /// Only the band's read index moves; samples already in the ring stay valid.
    pub fn set_delay_ms(&mut self, band: Band, delay_ms: f32) {
        let delay_ms = clamp_param("delay.delay_ms", delay_ms, 0.0, self.max_delay_ms);
        let slot = &mut self.bands[band.index()];
        slot.delay_ms = delay_ms;
        slot.delay_samples = delay_ms * self.sample_rate / 1000.0;
        slot.read_index = Self::read_index_for(self.write_index, slot.delay_samples, self.capacity);
        trace!(band = band.name(), delay_ms, samples = slot.delay_samples, "Band delay updated");
    }

    pub fn delay_ms(&self, band: Band) -> f32 {
        self.bands[band.index()].delay_ms
    }

    /// Delay in (fractional) samples
    pub fn delay_samples(&self, band: Band) -> f32 {
        self.bands[band.index()].delay_samples
    }

    pub fn set_phase_invert(&mut self, band: Band, invert: bool) {
        self.bands[band.index()].invert = invert;
        trace!(band = band.name(), invert, "Band polarity updated");
    }

    pub fn is_phase_inverted(&self, band: Band) -> bool {
        self.bands[band.index()].invert
    }

    pub fn settings(&self) -> DelaySettings {
        DelaySettings {
            delay_ms: std::array::from_fn(|index| self.bands[index].delay_ms),
            phase_invert: std::array::from_fn(|index| self.bands[index].invert),
        }
    }

    pub fn set_settings(&mut self, settings: &DelaySettings) {
        for band in Band::ALL {
            self.set_delay_ms(band, settings.delay_ms[band.index()]);
            self.set_phase_invert(band, settings.phase_invert[band.index()]);
        }
    }

    /// Resize the rings for a new sample rate and re-derive every delay from its ms value
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.capacity = Self::capacity_for(sample_rate, self.max_delay_ms);
        for slot in &mut self.bands {
            for ring in &mut slot.rings {
                ring.clear();
                ring.resize(self.capacity, 0.0);
            }
        }
        self.write_index = 0;
        let settings = self.settings();
        self.set_settings(&settings);
        debug!(sample_rate, capacity = self.capacity, "Delay lines resized");
    }

    /// Silence every ring and rewind the write index
    pub fn reset(&mut self) {
        for slot in &mut self.bands {
            for ring in &mut slot.rings {
                ring.fill(0.0);
            }
        }
        self.write_index = 0;
        for slot in &mut self.bands {
            slot.read_index = Self::read_index_for(0, slot.delay_samples, self.capacity);
        }
    }

    /// Process one stereo frame of every band and advance all indices
    pub fn process_frame(
        &mut self,
        input: [[f32; CHANNELS]; BAND_COUNT],
    ) -> [[f32; CHANNELS]; BAND_COUNT] {
        let write = self.write_index;
        let capacity = self.capacity;
        let output = std::array::from_fn(|band| {
            let slot = &mut self.bands[band];
            std::array::from_fn(|channel| {
                slot.rings[channel][write] = input[band][channel];
                Self::read(slot, channel, slot.read_index, capacity)
            })
        });
        self.advance(1);
        output
    }

    /// Run one band's stereo block through its delay
    ///
    /// Starts at the current write index and leaves all indices untouched;
    /// call [`DelayLine::advance`] once every band of the block is done.
    pub fn process_band(&mut self, band: Band, left: &mut [f32], right: &mut [f32]) {
        let capacity = self.capacity;
        let write_start = self.write_index;
        let slot = &mut self.bands[band.index()];
        let read_start = slot.read_index;

        for (channel, buffer) in [left, right].into_iter().enumerate() {
            for (offset, sample) in buffer.iter_mut().enumerate() {
                slot.rings[channel][(write_start + offset) % capacity] = *sample;
                *sample = Self::read(slot, channel, (read_start + offset) % capacity, capacity);
            }
        }
    }

    /// Feed silence into a band that is not processed this block
    pub fn skip_band(&mut self, band: Band, frames: usize) {
        let capacity = self.capacity;
        let write_start = self.write_index;
        for ring in &mut self.bands[band.index()].rings {
            for offset in 0..frames {
                ring[(write_start + offset) % capacity] = 0.0;
            }
        }
    }

    /// Move the shared write index and every read index forward
    pub fn advance(&mut self, frames: usize) {
        let capacity = self.capacity;
        self.write_index = (self.write_index + frames) % capacity;
        for slot in &mut self.bands {
            slot.read_index = (slot.read_index + frames) % capacity;
        }
    }

    #[inline]
    fn read(slot: &BandDelay, channel: usize, read_index: usize, capacity: usize) -> f32 {
        let ring = &slot.rings[channel];
        let fraction = slot.fraction();
        let value = if fraction > FRACTION_EPSILON {
            let older = ring[(read_index + capacity - 1) % capacity];
            ring[read_index] * (1.0 - fraction) + older * fraction
        } else {
            ring[read_index]
        };
        if slot.invert {
            -value
        } else {
            value
        }
    }

    fn read_index_for(write_index: usize, delay_samples: f32, capacity: usize) -> usize {
        let whole = (delay_samples.floor() as usize).min(capacity - 1);
        (write_index + capacity - whole) % capacity
    }
}

impl Default for DelayLine {
    fn default() -> Self {
        Self::new(48000.0, params::MAX_DELAY_MS)
    }
}

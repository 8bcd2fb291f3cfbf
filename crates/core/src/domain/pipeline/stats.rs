//! Metering snapshot refreshed by every processed block

use crate::domain::audio::CHANNELS;
use crate::domain::crossover::{Band, BAND_COUNT};
use serde::Serialize;
use std::time::Duration;

/// Peak-hold decay applied per block when no new peak arrives
pub const PEAK_DECAY: f32 = 0.8;

/// Hold a new peak or let the held one fall back
#[inline]
pub fn hold_peak(held: f32, block_peak: f32) -> f32 {
    if block_peak > held {
        block_peak
    } else {
        held * PEAK_DECAY
    }
}

/// Statistics exposed to metering and UI collaborators
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingStatistics {
    /// Held input peak per channel (linear)
    pub input_peak: [f32; CHANNELS],
    /// Held output peak per channel (linear)
    pub output_peak: [f32; CHANNELS],
    /// Held post-gain peak per band and channel (linear)
    pub band_peak: [[f32; CHANNELS]; BAND_COUNT],
    /// Compressor gain reduction per band (positive dB)
    pub compression_db: [f32; BAND_COUNT],
    /// Limiter gain reduction per band (positive dB)
    pub limiting_db: [f32; BAND_COUNT],
    /// Output samples clamped since the last reset
    pub clipped_samples: u64,
    pub blocks_processed: u64,
    /// Wall time spent in the last block
    pub processing_time: Duration,
}

impl ProcessingStatistics {
    pub(crate) fn update_input(&mut self, peaks: [f32; CHANNELS]) {
        for (held, peak) in self.input_peak.iter_mut().zip(peaks) {
            *held = hold_peak(*held, peak);
        }
    }

    pub(crate) fn update_output(&mut self, peaks: [f32; CHANNELS]) {
        for (held, peak) in self.output_peak.iter_mut().zip(peaks) {
            *held = hold_peak(*held, peak);
        }
    }

    pub(crate) fn update_band(&mut self, band: Band, peaks: [f32; CHANNELS]) {
        for (held, peak) in self.band_peak[band.index()].iter_mut().zip(peaks) {
            *held = hold_peak(*held, peak);
        }
    }

    pub(crate) fn record_gain_reduction(&mut self, band: Band, reduction_db: [f32; 2]) {
        self.compression_db[band.index()] = reduction_db[0];
        self.limiting_db[band.index()] = reduction_db[1];
    }

    pub(crate) fn finish_block(&mut self, clipped: u32, elapsed: Duration) {
        self.clipped_samples += u64::from(clipped);
        self.blocks_processed += 1;
        self.processing_time = elapsed;
    }

    /// Share of the block period used by the last block (1.0 = deadline hit)
    pub fn block_load(&self, block_period: Duration) -> f32 {
        if block_period.is_zero() {
            return 0.0;
        }
        self.processing_time.as_secs_f32() / block_period.as_secs_f32()
    }

    /// Largest gain reduction currently applied in any band, in dB
    pub fn max_gain_reduction_db(&self) -> f32 {
        self.compression_db
            .iter()
            .zip(&self.limiting_db)
            .map(|(c, l)| c + l)
            .fold(0.0, f32::max)
    }
}

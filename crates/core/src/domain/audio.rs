//! Sample formats and block layout shared by every processing stage
//!
//! Blocks arrive from the converter side as interleaved signed 16-bit stereo
//! and are worked on internally as two planar `f32` channel buffers in
//! [-1.0, 1.0].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while configuring the processing core
#[derive(Debug, Error)]
pub enum AudioError {
    /// Invalid configuration for a processing component
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The requested configuration is outside what the core supports
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// A block did not have the expected number of samples
    #[error("Block size mismatch: expected {expected} samples, got {actual}")]
    BlockSize { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Number of interleaved channels in every block
pub const CHANNELS: usize = 2;

/// Stereo frames per block exchanged with the converters
pub const DEFAULT_BLOCK_FRAMES: usize = 128;

/// Interleaved `i16` entries per default block
pub const DEFAULT_BLOCK_SAMPLES: usize = DEFAULT_BLOCK_FRAMES * CHANNELS;

/// Scale between full-scale `i16` and normalized float
const I16_SCALE: f32 = 32767.0;

/// Lowest and highest sample rates the core accepts
pub const MIN_SAMPLE_RATE_HZ: u32 = 8_000;
pub const MAX_SAMPLE_RATE_HZ: u32 = 192_000;

/// Audio sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRate {
    Hz44100,
    Hz48000,
    Hz96000,
    Hz192000,
    Custom(u32),
}

impl SampleRate {
    pub fn hz(&self) -> u32 {
        match self {
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
            SampleRate::Hz96000 => 96000,
            SampleRate::Hz192000 => 192000,
            SampleRate::Custom(hz) => *hz,
        }
    }

    pub fn from_hz(hz: u32) -> Self {
        match hz {
            44100 => SampleRate::Hz44100,
            48000 => SampleRate::Hz48000,
            96000 => SampleRate::Hz96000,
            192000 => SampleRate::Hz192000,
            hz => SampleRate::Custom(hz),
        }
    }

    /// Sample rate as `f32`, the form every coefficient calculation wants
    pub fn as_f32(&self) -> f32 {
        self.hz() as f32
    }

    /// Reject rates the filter designers cannot handle
    pub fn validate(&self) -> Result<()> {
        let hz = self.hz();
        if !(MIN_SAMPLE_RATE_HZ..=MAX_SAMPLE_RATE_HZ).contains(&hz) {
            return Err(AudioError::UnsupportedConfiguration(format!(
                "sample rate {hz} Hz outside {MIN_SAMPLE_RATE_HZ}..={MAX_SAMPLE_RATE_HZ} Hz"
            )));
        }
        Ok(())
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        SampleRate::Hz48000
    }
}

/// One side of the stereo pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub const ALL: [Channel; CHANNELS] = [Channel::Left, Channel::Right];

    pub fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }
}

/// Convert a single `i16` sample to normalized float
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / I16_SCALE
}

/// Convert a normalized float back to `i16`
///
/// Returns the clamped sample and whether clamping took place.
#[inline]
pub fn f32_to_i16(sample: f32) -> (i16, bool) {
    let scaled = (sample * I16_SCALE).round();
    if scaled > i16::MAX as f32 {
        (i16::MAX, true)
    } else if scaled < i16::MIN as f32 {
        (i16::MIN, true)
    } else {
        (scaled as i16, false)
    }
}

/// Split an interleaved stereo block into two planar float buffers
///
/// Only `min(left.len(), right.len(), input.len() / 2)` frames are written.
pub fn deinterleave(input: &[i16], left: &mut [f32], right: &mut [f32]) {
    for ((frame, l), r) in input.chunks_exact(CHANNELS).zip(left.iter_mut()).zip(right.iter_mut()) {
        *l = i16_to_f32(frame[0]);
        *r = i16_to_f32(frame[1]);
    }
}

/// Interleave two planar float buffers into an `i16` block
///
/// Returns the number of samples that had to be clamped.
pub fn interleave(left: &[f32], right: &[f32], output: &mut [i16]) -> u32 {
    let mut clipped = 0;
    for ((frame, &l), &r) in output.chunks_exact_mut(CHANNELS).zip(left).zip(right) {
        let (l, l_clipped) = f32_to_i16(l);
        let (r, r_clipped) = f32_to_i16(r);
        frame[0] = l;
        frame[1] = r;
        clipped += u32::from(l_clipped) + u32::from(r_clipped);
    }
    clipped
}

/// Largest absolute sample in a buffer
#[inline]
pub fn peak_level(buffer: &[f32]) -> f32 {
    buffer.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()))
}

//! Domain entities and business rules

pub mod audio;
pub mod config;
pub mod crossover;
pub mod delay;
pub mod dsp;
pub mod pipeline;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{AudioError, Channel, SampleRate, CHANNELS};
pub use config::{BandsplitConfig, ConfigError, FactoryPreset, ProcessorSettings};
pub use crossover::{Band, BandBuffers, CrossoverNetwork, CrossoverSettings, BAND_COUNT};
pub use delay::{DelayLine, DelaySettings};
pub use dsp::{
    Compressor, CompressorParams, Dynamics, FilterAlignment, FilterOrder, Limiter, LimiterParams,
};
pub use pipeline::{Pipeline, PipelineConfig, ProcessingStatistics};

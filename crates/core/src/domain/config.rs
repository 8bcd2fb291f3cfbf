//! Configuration management for Bandsplit
//!
//! This module provides:
//! - The complete processor settings record (crossover, dynamics, delay)
//! - Engine parameters and their TOML file representation
//! - Factory presets

use crate::domain::audio::AudioError;
use crate::domain::crossover::{CrossoverSettings, BAND_COUNT};
use crate::domain::delay::DelaySettings;
use crate::domain::dsp::{CompressorParams, FilterAlignment, FilterOrder, LimiterParams};
use crate::domain::pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Engine configuration rejected: {0}")]
    Engine(#[from] AudioError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),
}

/// Settings of every processing module
///
/// This is the record the configuration/preset layer exchanges with the
/// pipeline: dB and millisecond units throughout, one compressor and
/// limiter entry per band (sub, low, mid, high).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorSettings {
    pub crossover: CrossoverSettings,
    pub compressor: [CompressorParams; BAND_COUNT],
    pub limiter: [LimiterParams; BAND_COUNT],
    pub delay: DelaySettings,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        FactoryPreset::Flat.settings()
    }
}

impl ProcessorSettings {
    /// Check the invariants the components rely on their caller for
    pub fn validate(&self) -> Result<()> {
        if !self.crossover.is_ordered() {
            return Err(ConfigError::Invalid(format!(
                "crossover cutoffs must ascend, got {} / {} / {} Hz",
                self.crossover.low_cutoff_hz,
                self.crossover.mid_cutoff_hz,
                self.crossover.high_cutoff_hz
            )));
        }
        Ok(())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandsplitConfig {
    /// Start with processing bypassed
    pub bypass: bool,
    pub engine: PipelineConfig,
    pub processing: ProcessorSettings,
}

impl BandsplitConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config = Self::from_toml(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(path, self.to_toml()?).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Create factory default configuration
    pub fn factory_default() -> Self {
        Self::default()
    }

    /// Configuration starting from a factory preset
    pub fn from_preset(preset: FactoryPreset) -> Self {
        Self {
            processing: preset.settings(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.processing.validate()
    }
}

// ============================================================================
// FACTORY PRESETS
// ============================================================================

/// Built-in voicings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactoryPreset {
    Flat,
    Rock,
    Jazz,
    Dangdut,
    Pop,
}

struct Voicing {
    cutoffs: [f32; 3],
    gain_db: [f32; BAND_COUNT],
    compressor: CompressorParams,
    limiter_threshold_db: f32,
    limiter_release_ms: f32,
}

impl FactoryPreset {
    pub const ALL: [FactoryPreset; 5] = [
        FactoryPreset::Flat,
        FactoryPreset::Rock,
        FactoryPreset::Jazz,
        FactoryPreset::Dangdut,
        FactoryPreset::Pop,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FactoryPreset::Flat => "flat",
            FactoryPreset::Rock => "rock",
            FactoryPreset::Jazz => "jazz",
            FactoryPreset::Dangdut => "dangdut",
            FactoryPreset::Pop => "pop",
        }
    }

    /// Look a preset up by name, ignoring case
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ConfigError::PresetNotFound(name.to_string()))
    }

    fn voicing(&self) -> Voicing {
        let compressor = |threshold_db, ratio, attack_ms, release_ms, makeup_gain_db, knee_width_db| {
            CompressorParams {
                threshold_db,
                ratio,
                attack_ms,
                release_ms,
                makeup_gain_db,
                knee_width_db,
                enabled: true,
            }
        };

        match self {
            FactoryPreset::Flat => Voicing {
                cutoffs: [80.0, 500.0, 4000.0],
                gain_db: [0.0; BAND_COUNT],
                compressor: CompressorParams {
                    enabled: false,
                    ..compressor(-24.0, 2.0, 20.0, 200.0, 0.0, 6.0)
                },
                limiter_threshold_db: 0.0,
                limiter_release_ms: 50.0,
            },
            FactoryPreset::Rock => Voicing {
                cutoffs: [90.0, 600.0, 3500.0],
                gain_db: [3.0, 2.0, -1.0, 2.5],
                compressor: compressor(-20.0, 3.0, 15.0, 150.0, 1.5, 4.0),
                limiter_threshold_db: -0.5,
                limiter_release_ms: 45.0,
            },
            FactoryPreset::Jazz => Voicing {
                cutoffs: [70.0, 450.0, 5000.0],
                gain_db: [1.0, 1.5, 0.5, 0.0],
                compressor: compressor(-18.0, 1.5, 25.0, 250.0, 0.5, 8.0),
                limiter_threshold_db: -1.0,
                limiter_release_ms: 60.0,
            },
            FactoryPreset::Dangdut => Voicing {
                cutoffs: [100.0, 400.0, 2800.0],
                gain_db: [3.5, 1.0, 2.5, 2.0],
                compressor: compressor(-22.0, 3.5, 10.0, 120.0, 2.0, 3.0),
                limiter_threshold_db: -0.5,
                limiter_release_ms: 40.0,
            },
            FactoryPreset::Pop => Voicing {
                cutoffs: [85.0, 450.0, 3800.0],
                gain_db: [2.0, 1.0, 0.0, 1.5],
                compressor: compressor(-18.0, 2.5, 15.0, 180.0, 1.0, 5.0),
                limiter_threshold_db: -0.5,
                limiter_release_ms: 50.0,
            },
        }
    }

    /// Complete settings record for this preset
    pub fn settings(&self) -> ProcessorSettings {
        let voicing = self.voicing();
        let [low, mid, high] = voicing.cutoffs;

        ProcessorSettings {
            crossover: CrossoverSettings {
                low_cutoff_hz: low,
                mid_cutoff_hz: mid,
                high_cutoff_hz: high,
                alignment: FilterAlignment::LinkwitzRiley,
                order: FilterOrder::Fourth,
                gain_db: voicing.gain_db,
                mute: [false; BAND_COUNT],
            },
            compressor: [voicing.compressor; BAND_COUNT],
            limiter: [LimiterParams {
                threshold_db: voicing.limiter_threshold_db,
                release_ms: voicing.limiter_release_ms,
                enabled: true,
            }; BAND_COUNT],
            delay: DelaySettings::default(),
        }
    }
}

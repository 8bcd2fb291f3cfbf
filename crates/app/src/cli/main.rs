//! Bandsplit CLI Application

mod process;

use anyhow::Context;
use bandsplit_core::domain::config::{BandsplitConfig, FactoryPreset};
use bandsplit_core::domain::crossover::{Band, CrossoverNetwork};
use bandsplit_core::domain::dsp::linear_to_db;
use bandsplit_infra::audio::PcmWriter;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "bandsplit")]
#[command(about = "Four-band stereo crossover processor", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a raw s16le stereo file through the processor
    Process {
        /// Input file (headerless s16le, interleaved stereo)
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Factory preset to load instead of a configuration file
        #[arg(short, long, conflicts_with = "config")]
        preset: Option<String>,
        /// Copy input to output unprocessed
        #[arg(long)]
        bypass: bool,
        /// Pace blocks at the sample rate and report overruns
        #[arg(long)]
        realtime: bool,
        /// Print the final statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a test signal as raw s16le stereo
    Generate {
        /// Output file
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = Signal::Sine)]
        signal: Signal,
        /// Sine frequency in Hz
        #[arg(long, default_value_t = 1000.0)]
        freq: f32,
        /// Peak level in dBFS
        #[arg(long, default_value_t = -6.0, allow_hyphen_values = true)]
        level_db: f32,
        #[arg(long, default_value_t = 1.0)]
        seconds: f32,
        #[arg(long, default_value_t = 48000)]
        sample_rate: u32,
    },
    /// List factory presets, or print one as TOML
    Presets {
        /// Preset to print
        name: Option<String>,
    },
    /// Print the per-band and summed magnitude response
    Response {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Factory preset to load instead of a configuration file
        #[arg(short, long, conflicts_with = "config")]
        preset: Option<String>,
        /// Log-spaced frequencies between 20 Hz and 20 kHz
        #[arg(long, default_value_t = 24)]
        points: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Signal {
    Sine,
    Impulse,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Process {
            input,
            output,
            config,
            preset,
            bypass,
            realtime,
            json,
        } => {
            let config = load_config(config.as_deref(), preset.as_deref()).await?;
            let options = process::Options {
                input,
                output,
                bypass,
                realtime,
                json,
            };
            process::run(config, options).await?;
        }
        Commands::Generate {
            output,
            signal,
            freq,
            level_db,
            seconds,
            sample_rate,
        } => {
            generate(&output, signal, freq, level_db, seconds, sample_rate)?;
        }
        Commands::Presets { name } => {
            presets(name.as_deref())?;
        }
        Commands::Response {
            config,
            preset,
            points,
        } => {
            let config = load_config(config.as_deref(), preset.as_deref()).await?;
            response(&config, points);
        }
    }

    Ok(())
}

/// Configuration from a file, a preset, or the factory default
async fn load_config(path: Option<&Path>, preset: Option<&str>) -> anyhow::Result<BandsplitConfig> {
    if let Some(path) = path {
        return BandsplitConfig::load_from_file(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()));
    }
    if let Some(name) = preset {
        let preset = FactoryPreset::from_name(name)?;
        info!(preset = preset.name(), "Using factory preset");
        return Ok(BandsplitConfig::from_preset(preset));
    }
    Ok(BandsplitConfig::factory_default())
}

fn generate(
    output: &Path,
    signal: Signal,
    freq: f32,
    level_db: f32,
    seconds: f32,
    sample_rate: u32,
) -> anyhow::Result<()> {
    let frames = (seconds.max(0.0) * sample_rate as f32).round() as usize;
    let amplitude = bandsplit_core::domain::dsp::db_to_linear(level_db.min(0.0));
    let step = 2.0 * std::f64::consts::PI * f64::from(freq) / f64::from(sample_rate.max(1));

    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = PcmWriter::new(BufWriter::new(file));

    let mut block = Vec::with_capacity(1024);
    for chunk_start in (0..frames).step_by(512) {
        block.clear();
        for i in chunk_start..frames.min(chunk_start + 512) {
            let value = match signal {
                Signal::Sine => amplitude * (step * i as f64).sin() as f32,
                Signal::Impulse if i == 0 => amplitude,
                Signal::Impulse => 0.0,
            };
            let sample = (value * 32767.0).round() as i16;
            block.extend_from_slice(&[sample, sample]);
        }
        writer.write_block(&block)?;
    }
    writer.flush()?;

    info!(
        path = %output.display(),
        frames,
        sample_rate,
        "Test signal written"
    );
    Ok(())
}

fn presets(name: Option<&str>) -> anyhow::Result<()> {
    match name {
        Some(name) => {
            let preset = FactoryPreset::from_name(name)?;
            print!("{}", BandsplitConfig::from_preset(preset).to_toml()?);
        }
        None => {
            for preset in FactoryPreset::ALL {
                let settings = preset.settings();
                let [low, mid, high] = settings.crossover.cutoffs();
                let gains = settings
                    .crossover
                    .gain_db
                    .iter()
                    .map(|g| format!("{g:+.1}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{:<8} {low:>5.0} / {mid:>5.0} / {high:>5.0} Hz   gains {gains} dB", preset.name());
            }
        }
    }
    Ok(())
}

fn response(config: &BandsplitConfig, points: usize) {
    let sample_rate = config.engine.sample_rate().as_f32();
    let network = CrossoverNetwork::with_settings(&config.processing.crossover, sample_rate);
    let points = points.max(2);

    println!(
        "{:>9} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "Hz", "sub", "low", "mid", "high", "sum"
    );
    for i in 0..points {
        let freq = 20.0 * 1000f32.powf(i as f32 / (points - 1) as f32);
        if freq >= sample_rate / 2.0 {
            break;
        }
        let bands = Band::ALL.map(|band| magnitude_db(network.band_response(band, freq).norm()));
        let sum = magnitude_db(network.summed_response(freq).norm());
        println!(
            "{freq:>9.1} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {sum:>8.2}",
            bands[0], bands[1], bands[2], bands[3]
        );
    }
}

fn magnitude_db(magnitude: f64) -> f32 {
    linear_to_db(magnitude as f32)
}

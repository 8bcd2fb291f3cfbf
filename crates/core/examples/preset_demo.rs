//! Example demonstrating configuration files and factory presets
//!
//! Run with: cargo run --package bandsplit-core --example preset_demo

use bandsplit_core::domain::config::{BandsplitConfig, FactoryPreset};
use bandsplit_core::domain::crossover::Band;
use bandsplit_core::domain::pipeline::Pipeline;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("bandsplit_core=debug,info")
        .init();

    println!("=== Bandsplit Preset Demo ===\n");

    // 1. List factory presets
    println!("1. Factory presets:");
    for preset in FactoryPreset::ALL {
        let settings = preset.settings();
        let [low, mid, high] = settings.crossover.cutoffs();
        println!(
            "   {:<8} cutoffs {low}/{mid}/{high} Hz, gains {:?} dB",
            preset.name(),
            settings.crossover.gain_db
        );
    }

    // 2. Save a configuration based on one of them
    println!("\n2. Saving the rock preset...");
    let dir = std::env::temp_dir().join("bandsplit-demo");
    let config_path = dir.join("rock.toml");
    let config = BandsplitConfig::from_preset(FactoryPreset::Rock);
    config.save_to_file(&config_path).await?;
    println!("   ✓ Configuration saved to {}", config_path.display());

    // 3. Load it back and build a pipeline
    println!("\n3. Loading configuration and building the pipeline...");
    let loaded = BandsplitConfig::load_from_file(&config_path).await?;
    let pipeline = Pipeline::with_settings(loaded.engine.clone(), &loaded.processing)?;
    println!(
        "   ✓ Pipeline at {} Hz, {} frames per block",
        pipeline.sample_rate().hz(),
        pipeline.config().block_frames
    );

    // 4. Show the applied band gains
    println!("\n4. Band gains:");
    for band in Band::ALL {
        println!("   {:<5} {:+.1} dB", band.name(), pipeline.crossover().gain_db(band));
    }

    std::fs::remove_dir_all(&dir)?;
    println!("\n=== Demo completed successfully! ===");
    Ok(())
}

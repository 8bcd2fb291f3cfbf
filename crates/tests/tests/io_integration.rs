//! Integration tests across configuration files, PCM I/O and the block link

use bandsplit_core::domain::config::{BandsplitConfig, ConfigError, FactoryPreset};
use bandsplit_core::domain::crossover::Band;
use bandsplit_core::domain::dsp::{FilterAlignment, FilterOrder};
use bandsplit_core::domain::pipeline::Pipeline;
use bandsplit_infra::audio::{block_link, Offer, PcmReader, PcmWriter};
use bandsplit_tests::{sine_block, without_dynamics};
use std::io::Cursor;
use std::thread;
use tempfile::TempDir;

const CONFIG: &str = r#"
bypass = false

[engine]
sample_rate_hz = 44100
block_frames = 64
max_delay_ms = 20.0

[processing.crossover]
low_cutoff_hz = 120.0
mid_cutoff_hz = 900.0
high_cutoff_hz = 6000.0
alignment = "linkwitz-riley"
order = 8
gain_db = [1.0, 0.0, -2.0, 3.0]
mute = [false, false, false, true]

[processing.delay]
delay_ms = [0.0, 0.5, 1.0, 30.0]
phase_invert = [true, false, false, false]
"#;

fn pcm(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[tokio::test]
async fn test_config_file_builds_pipeline() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bandsplit.toml");
    tokio::fs::write(&path, CONFIG).await.unwrap();

    let config = BandsplitConfig::load_from_file(&path).await.unwrap();
    let pipeline = Pipeline::with_settings(config.engine.clone(), &config.processing).unwrap();

    assert_eq!(pipeline.sample_rate().hz(), 44100);
    assert_eq!(pipeline.crossover().cutoffs(), [120.0, 900.0, 6000.0]);
    assert_eq!(pipeline.crossover().alignment(), FilterAlignment::LinkwitzRiley);
    assert_eq!(pipeline.crossover().order(), FilterOrder::Eighth);
    assert!(pipeline.crossover().is_muted(Band::High));
    assert!(pipeline.delay().is_phase_inverted(Band::Sub));

    // 30 ms exceeds the configured 20 ms ring
    assert_eq!(pipeline.delay().delay_ms(Band::High), 20.0);
    assert_eq!(pipeline.delay().delay_ms(Band::Mid), 1.0);

    // Sections left out fall back to the flat voicing
    assert_eq!(
        config.processing.compressor,
        FactoryPreset::Flat.settings().compressor
    );
}

#[tokio::test]
async fn test_unordered_cutoffs_rejected_at_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    let text = CONFIG.replace("mid_cutoff_hz = 900.0", "mid_cutoff_hz = 60.0");
    tokio::fs::write(&path, text).await.unwrap();

    let result = BandsplitConfig::load_from_file(&path).await;
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[tokio::test]
async fn test_saved_pipeline_settings_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("presets").join("tuned.toml");

    let mut config = BandsplitConfig::from_preset(FactoryPreset::Dangdut);
    let mut pipeline = Pipeline::with_settings(config.engine.clone(), &config.processing).unwrap();
    pipeline.crossover_mut().set_gain_db(Band::Mid, -3.5);
    pipeline.compressor_mut(Band::Sub).set_ratio(6.0);
    pipeline.delay_mut().set_delay_ms(Band::High, 2.25);

    config.processing = pipeline.settings();
    config.save_to_file(&path).await.unwrap();

    let reloaded = BandsplitConfig::load_from_file(&path).await.unwrap();
    let rebuilt = Pipeline::with_settings(reloaded.engine, &reloaded.processing).unwrap();
    assert_eq!(rebuilt.settings(), pipeline.settings());
    assert_eq!(rebuilt.crossover().gain_db(Band::Mid), -3.5);
}

#[test]
fn test_pcm_bypass_stream_is_bit_exact() {
    let config = BandsplitConfig::factory_default();
    let mut pipeline = Pipeline::new(config.engine.clone()).unwrap();
    pipeline.set_bypass(true);

    // Not a whole number of blocks
    let source = sine_block(1000, 440.0, 0.99, 0);
    let mut reader = PcmReader::new(Cursor::new(pcm(&source)), config.engine.block_frames);
    let mut writer = PcmWriter::new(Vec::new());

    let mut input = vec![0i16; reader.block_samples()];
    let mut output = vec![0i16; input.len()];
    loop {
        let frames = reader.read_block(&mut input).unwrap();
        if frames == 0 {
            break;
        }
        pipeline.process_block(&input, &mut output);
        writer.write_frames(&output, frames).unwrap();
    }

    assert_eq!(writer.frames_written(), 1000);
    assert_eq!(writer.into_inner(), pcm(&source));
    assert_eq!(pipeline.statistics().blocks_processed, 8);
}

#[test]
fn test_block_link_feeds_pipeline() {
    let settings = without_dynamics(FactoryPreset::Flat.settings());
    let mut pipeline = Pipeline::with_settings(Default::default(), &settings).unwrap();
    let block_samples = pipeline.config().block_samples();
    let (producer, consumer) = block_link(block_samples);

    let capture = thread::spawn(move || {
        for index in 0..16 {
            let mut block = producer.acquire();
            block.copy_from_slice(&sine_block(128, 1000.0, 0.5, index * 128));
            let mut pending = block;
            // Wait for the consumer instead of dropping
            while let Offer::Overrun(back) = producer.offer(pending).unwrap() {
                pending = back;
                thread::yield_now();
            }
        }
        producer.stats()
    });

    let mut output = vec![0i16; block_samples];
    while let Some(block) = consumer.recv() {
        pipeline.process_block(&block, &mut output);
        consumer.recycle(block);
    }
    let stats = capture.join().unwrap();

    assert_eq!(stats.delivered(), 16);
    assert_eq!(stats.offered(), 16 + stats.overruns());
    assert_eq!(pipeline.statistics().blocks_processed, 16);
    assert!(pipeline.statistics().output_peak[0] > 0.3);
}

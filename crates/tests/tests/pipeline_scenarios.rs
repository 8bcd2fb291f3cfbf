//! End-to-end scenarios through the complete pipeline
//!
//! These tests drive `Pipeline::process_block` with interleaved int16 blocks
//! and check band buffers, mix output and statistics together.

use bandsplit_core::domain::audio::Channel;
use bandsplit_core::domain::config::{FactoryPreset, ProcessorSettings};
use bandsplit_core::domain::crossover::{Band, CrossoverSettings};
use bandsplit_core::domain::dsp::{linear_to_db, FilterAlignment, FilterOrder};
use bandsplit_core::domain::pipeline::{Pipeline, PipelineConfig};
use bandsplit_tests::{impulse_block, left, process_signal, rms, sine_block, without_dynamics};

fn reference_settings() -> ProcessorSettings {
    let mut settings = without_dynamics(ProcessorSettings::default());
    settings.crossover = CrossoverSettings {
        low_cutoff_hz: 80.0,
        mid_cutoff_hz: 1000.0,
        high_cutoff_hz: 8000.0,
        alignment: FilterAlignment::LinkwitzRiley,
        order: FilterOrder::Fourth,
        ..CrossoverSettings::default()
    };
    settings
}

fn pipeline_with(block_frames: usize, settings: &ProcessorSettings) -> Pipeline {
    let config = PipelineConfig {
        block_frames,
        ..PipelineConfig::default()
    };
    Pipeline::with_settings(config, settings).unwrap()
}

/// Level of each band on the left channel, relative to the input, once settled
///
/// `frames` must hold a whole number of half cycles of `freq`.
fn band_levels_db(freq: f32, amplitude: f32, frames: usize) -> [f32; 4] {
    let mut pipeline = pipeline_with(frames, &reference_settings());
    let mut output = vec![0i16; frames * 2];

    for block in 0..20 {
        let input = sine_block(frames, freq, amplitude, block * frames);
        pipeline.process_block(&input, &mut output);
    }

    let bands = pipeline.band_buffers(Channel::Left);
    let input_rms = amplitude / std::f32::consts::SQRT_2;
    Band::ALL.map(|band| linear_to_db(rms(bands.band(band)) / input_rms))
}

// ============================================================================
// BAND SPLITTING
// ============================================================================

#[test]
fn test_mid_crossover_sine_stays_in_low_and_mid() {
    let [sub, low, mid, high] = band_levels_db(1000.0, 1.0, 480);

    // 1 kHz sits on the low/mid crossover: -6 dB in each neighbour
    assert!((mid + 6.0).abs() < 1.0, "mid band at {mid} dB");
    assert!((low + 6.0).abs() < 1.0, "low band at {low} dB");
    assert!(sub < -40.0, "sub band at {sub} dB");
    assert!(high < -40.0, "high band at {high} dB");
}

#[test]
fn test_mid_band_sine_is_isolated() {
    let [sub, low, mid, high] = band_levels_db(2800.0, 0.5, 480);

    assert!(mid.abs() < 1.0, "mid band at {mid} dB");
    assert!(sub < -60.0, "sub band at {sub} dB");
    assert!(low < -20.0, "low band at {low} dB");
    assert!(high < -15.0, "high band at {high} dB");
}

#[test]
fn test_low_frequencies_reach_sub() {
    let [sub, low, mid, high] = band_levels_db(25.0, 0.5, 960);

    assert!(sub.abs() < 1.0, "sub band at {sub} dB");
    assert!(low < -15.0, "low band at {low} dB");
    assert!(mid < -60.0, "mid band at {mid} dB");
    assert!(high < -60.0, "high band at {high} dB");
}

#[test]
fn test_output_level_preserved_between_crossovers() {
    // Geometric centres of the low and mid bands
    for freq in [283.0, 2830.0] {
        let mut pipeline = pipeline_with(128, &reference_settings());
        let input = sine_block(24000, freq, 0.5, 0);

        let output = process_signal(&mut pipeline, &input);

        let tail = |signal: &[i16]| -> Vec<f32> {
            left(&signal[signal.len() - 4800 * 2..])
                .iter()
                .map(|&s| f32::from(s) / 32767.0)
                .collect()
        };
        let ratio_db = linear_to_db(rms(&tail(&output)) / rms(&tail(&input)));
        assert!(ratio_db.abs() < 0.5, "{freq} Hz summed to {ratio_db} dB");
    }
}

// ============================================================================
// MUTE, GAIN AND POLARITY
// ============================================================================

#[test]
fn test_muted_band_is_exactly_silent() {
    let mut settings = FactoryPreset::Rock.settings();
    settings.crossover.gain_db[Band::Low.index()] = 12.0;
    settings.crossover.mute[Band::Low.index()] = true;
    let mut pipeline = pipeline_with(128, &settings);
    let mut output = vec![0i16; 256];

    for block in 0..10 {
        let input = sine_block(128, 200.0, 0.9, block * 128);
        pipeline.process_block(&input, &mut output);

        for channel in Channel::ALL {
            let low = pipeline.band_buffers(channel).band(Band::Low);
            assert!(low.iter().all(|&s| s == 0.0));
        }
    }
    assert_eq!(pipeline.statistics().band_peak[Band::Low.index()], [0.0, 0.0]);
}

#[test]
fn test_phase_invert_negates_only_that_band() {
    let settings = reference_settings();
    let mut inverted_settings = settings.clone();
    inverted_settings.delay.phase_invert[Band::Mid.index()] = true;

    let mut plain = pipeline_with(128, &settings);
    let mut inverted = pipeline_with(128, &inverted_settings);
    let mut out_plain = vec![0i16; 256];
    let mut out_inverted = vec![0i16; 256];

    for block in 0..5 {
        let input = sine_block(128, 1500.0, 0.7, block * 128);
        plain.process_block(&input, &mut out_plain);
        inverted.process_block(&input, &mut out_inverted);

        for channel in Channel::ALL {
            let (a, b) = (plain.band_buffers(channel), inverted.band_buffers(channel));
            for band in Band::ALL {
                if band == Band::Mid {
                    assert!(a.band(band).iter().zip(b.band(band)).all(|(x, y)| *x == -*y));
                } else {
                    assert_eq!(a.band(band), b.band(band));
                }
            }
        }
    }
}

#[test]
fn test_band_gain_scales_band_output() {
    let settings = reference_settings();
    let mut boosted_settings = settings.clone();
    boosted_settings.crossover.gain_db[Band::High.index()] = 6.0;

    let mut plain = pipeline_with(128, &settings);
    let mut boosted = pipeline_with(128, &boosted_settings);
    let mut output = vec![0i16; 256];

    for block in 0..5 {
        let input = sine_block(128, 12000.0, 0.25, block * 128);
        plain.process_block(&input, &mut output);
        boosted.process_block(&input, &mut output);
    }

    let a = rms(plain.band_buffers(Channel::Right).band(Band::High));
    let b = rms(boosted.band_buffers(Channel::Right).band(Band::High));
    assert!((linear_to_db(b / a) - 6.0).abs() < 0.01);
}

// ============================================================================
// DELAY AND FIXED POINT
// ============================================================================

#[test]
fn test_band_delay_shifts_pipeline_output() {
    let settings = reference_settings();
    let mut delayed_settings = settings.clone();
    delayed_settings.delay.delay_ms = [1.5; 4];

    let mut plain = pipeline_with(128, &settings);
    let mut delayed = pipeline_with(128, &delayed_settings);

    let mut input = impulse_block(128, 20000);
    input.extend(vec![0i16; 128 * 2 * 3]);

    let out_plain = left(&process_signal(&mut plain, &input));
    let out_delayed = left(&process_signal(&mut delayed, &input));

    // 1.5 ms at 48 kHz
    let shift = 72;
    assert!(out_delayed[..shift].iter().all(|&s| s == 0));
    assert_eq!(&out_delayed[shift..], &out_plain[..out_plain.len() - shift]);
}

#[test]
fn test_bypass_reproduces_full_scale_block() {
    let mut pipeline = pipeline_with(128, &FactoryPreset::Jazz.settings());
    pipeline.set_bypass(true);

    let input: Vec<i16> = (0..256)
        .map(|i| if i % 3 == 0 { 32767 } else { -32767 })
        .collect();
    let mut output = vec![0i16; 256];
    pipeline.process_block(&input, &mut output);

    assert_eq!(output, input);
    assert_eq!(pipeline.statistics().clipped_samples, 0);
}

#[test]
fn test_boosted_full_scale_clips_and_counts() {
    let mut settings = reference_settings();
    settings.crossover.gain_db = [12.0; 4];
    let mut pipeline = pipeline_with(128, &settings);
    let mut output = vec![0i16; 256];

    for block in 0..4 {
        let input = sine_block(128, 440.0, 1.0, block * 128);
        pipeline.process_block(&input, &mut output);
    }

    let stats = pipeline.statistics();
    assert!(stats.clipped_samples > 0);
    assert!(stats.output_peak[0] > 1.0);
    assert!(output.contains(&i16::MAX));
}

#[test]
fn test_limiter_holds_band_peaks() {
    let mut settings = without_dynamics(FactoryPreset::Pop.settings());
    for params in &mut settings.limiter {
        params.enabled = true;
        params.threshold_db = -12.0;
    }
    let mut pipeline = pipeline_with(128, &settings);
    let mut output = vec![0i16; 256];

    for block in 0..40 {
        let input = sine_block(128, 1000.0, 0.9, block * 128);
        pipeline.process_block(&input, &mut output);
    }

    let ceiling = bandsplit_core::domain::dsp::db_to_linear(-12.0);
    for band in Band::ALL {
        let peak = pipeline
            .band_buffers(Channel::Left)
            .band(band)
            .iter()
            .fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= ceiling * 1.01, "{} peaked at {peak}", band.name());
    }
    assert!(pipeline.statistics().limiting_db.iter().any(|&db| db > 1.0));
}

#[test]
fn test_settings_survive_pipeline_roundtrip() {
    for preset in FactoryPreset::ALL {
        let settings = preset.settings();
        let pipeline = pipeline_with(64, &settings);
        assert_eq!(pipeline.settings(), settings, "{}", preset.name());
    }
}

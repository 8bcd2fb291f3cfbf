//! Property-based tests for the processing core
//!
//! These tests use proptest to verify invariants across many random inputs.

use bandsplit_core::domain::audio::{deinterleave, interleave, Channel};
use bandsplit_core::domain::config::{FactoryPreset, ProcessorSettings};
use bandsplit_core::domain::crossover::{Band, CrossoverNetwork, CrossoverSettings};
use bandsplit_core::domain::dsp::{FilterAlignment, FilterOrder};
use bandsplit_core::domain::pipeline::{Pipeline, PipelineConfig};
use proptest::prelude::*;

const FRAMES: usize = 64;

fn pipeline(settings: &ProcessorSettings) -> Pipeline {
    let config = PipelineConfig {
        block_frames: FRAMES,
        ..PipelineConfig::default()
    };
    Pipeline::with_settings(config, settings).unwrap()
}

fn alignment() -> impl Strategy<Value = FilterAlignment> {
    prop_oneof![
        Just(FilterAlignment::Butterworth),
        Just(FilterAlignment::LinkwitzRiley)
    ]
}

fn order() -> impl Strategy<Value = FilterOrder> {
    prop_oneof![
        Just(FilterOrder::Second),
        Just(FilterOrder::Fourth),
        Just(FilterOrder::Eighth)
    ]
}

/// Ascending cutoffs spread over the audio band
fn cutoffs() -> impl Strategy<Value = [f32; 3]> {
    (30.0f32..300.0, 2.0f32..8.0, 2.0f32..8.0)
        .prop_map(|(low, mid_ratio, high_ratio)| [low, low * mid_ratio, low * mid_ratio * high_ratio])
}

fn block() -> impl Strategy<Value = Vec<i16>> {
    prop::collection::vec(any::<i16>(), FRAMES * 2)
}

// Helper: random settings within (and around) every parameter range
fn settings() -> impl Strategy<Value = ProcessorSettings> {
    (
        cutoffs(),
        alignment(),
        order(),
        prop::array::uniform4(-30.0f32..15.0),
        prop::array::uniform4(any::<bool>()),
        (-70.0f32..5.0, 0.5f32..25.0, 0.0f32..150.0, 0.0f32..1500.0),
        (-70.0f32..5.0, 0.0f32..1500.0),
        prop::array::uniform4(-1.0f32..120.0),
        prop::array::uniform4(any::<bool>()),
    )
        .prop_map(
            |(cutoffs, alignment, order, gain_db, mute, comp, limit, delay_ms, invert)| {
                let mut settings = FactoryPreset::Flat.settings();
                let [low, mid, high] = cutoffs;
                settings.crossover = CrossoverSettings {
                    low_cutoff_hz: low,
                    mid_cutoff_hz: mid,
                    high_cutoff_hz: high,
                    alignment,
                    order,
                    gain_db,
                    mute,
                };
                for params in &mut settings.compressor {
                    params.threshold_db = comp.0;
                    params.ratio = comp.1;
                    params.attack_ms = comp.2;
                    params.release_ms = comp.3;
                    params.enabled = true;
                }
                for params in &mut settings.limiter {
                    params.threshold_db = limit.0;
                    params.release_ms = limit.1;
                }
                settings.delay.delay_ms = delay_ms;
                settings.delay.phase_invert = invert;
                settings
            },
        )
}

proptest! {
    /// Property: int16 -> float -> int16 reproduces every value without clipping
    #[test]
    fn fixed_point_roundtrip_is_exact(input in block()) {
        let mut left = vec![0.0; FRAMES];
        let mut right = vec![0.0; FRAMES];
        let mut output = vec![0i16; FRAMES * 2];

        deinterleave(&input, &mut left, &mut right);
        let clipped = interleave(&left, &right, &mut output);

        prop_assert_eq!(clipped, 0);
        prop_assert_eq!(output, input);
    }

    /// Property: bypass is a bit-exact copy for any block and any settings
    #[test]
    fn bypass_is_bit_exact(settings in settings(), input in block()) {
        let mut pipeline = pipeline(&settings);
        pipeline.set_bypass(true);
        let mut output = vec![0i16; FRAMES * 2];

        pipeline.process_block(&input, &mut output);

        prop_assert_eq!(output, input);
    }

    /// Property: random (even out-of-range) settings never produce NaN or Inf
    #[test]
    fn band_buffers_stay_finite(
        settings in settings(),
        blocks in prop::collection::vec(block(), 1..6)
    ) {
        let mut pipeline = pipeline(&settings);
        let mut output = vec![0i16; FRAMES * 2];

        for input in &blocks {
            pipeline.process_block(input, &mut output);
            for channel in Channel::ALL {
                let bands = pipeline.band_buffers(channel);
                for band in Band::ALL {
                    prop_assert!(
                        bands.band(band).iter().all(|s| s.is_finite()),
                        "{} band produced NaN or Inf",
                        band.name()
                    );
                }
            }
        }

        let stats = pipeline.statistics();
        prop_assert!(stats.output_peak.iter().all(|p| p.is_finite()));
        prop_assert_eq!(stats.blocks_processed, blocks.len() as u64);
    }

    /// Property: a muted band contributes exactly zero whatever else is set
    #[test]
    fn muted_band_is_exactly_zero(
        settings in settings(),
        band_index in 0usize..4,
        input in block()
    ) {
        let mut settings = settings;
        settings.crossover.mute[band_index] = true;
        let band = Band::ALL[band_index];

        let mut pipeline = pipeline(&settings);
        let mut output = vec![0i16; FRAMES * 2];
        pipeline.process_block(&input, &mut output);

        for channel in Channel::ALL {
            prop_assert!(pipeline.band_buffers(channel).band(band).iter().all(|&s| s == 0.0));
        }
    }

    /// Property: toggling polarity negates that band and leaves the rest alone
    #[test]
    fn phase_invert_negates_band(
        settings in settings(),
        band_index in 0usize..4,
        input in block()
    ) {
        let mut plain_settings = settings;
        plain_settings.delay.phase_invert = [false; 4];
        let mut inverted_settings = plain_settings.clone();
        inverted_settings.delay.phase_invert[band_index] = true;

        let mut plain = pipeline(&plain_settings);
        let mut inverted = pipeline(&inverted_settings);
        let mut output = vec![0i16; FRAMES * 2];
        plain.process_block(&input, &mut output);
        inverted.process_block(&input, &mut output);

        for channel in Channel::ALL {
            for band in Band::ALL {
                let a = plain.band_buffers(channel).band(band);
                let b = inverted.band_buffers(channel).band(band);
                if band.index() == band_index {
                    prop_assert!(a.iter().zip(b).all(|(x, y)| *x == -*y));
                } else {
                    prop_assert_eq!(a, b);
                }
            }
        }
    }

    /// Property: unity-gain bands sum back to a flat response between crossovers
    #[test]
    fn summed_response_is_flat_mid_band(
        alignment in alignment(),
        order in prop_oneof![Just(FilterOrder::Fourth), Just(FilterOrder::Eighth)],
        low in 40.0f32..120.0,
    ) {
        // Crossovers three octaves apart
        let settings = CrossoverSettings {
            low_cutoff_hz: low,
            mid_cutoff_hz: low * 8.0,
            high_cutoff_hz: low * 64.0,
            alignment,
            order,
            ..CrossoverSettings::default()
        };
        let network = CrossoverNetwork::with_settings(&settings, 48000.0);

        for freq in [low * 8.0f32.sqrt(), low * 8.0 * 8.0f32.sqrt()] {
            let magnitude = network.summed_response(freq).norm();
            prop_assert!(
                (magnitude - 1.0).abs() < 0.15,
                "{} order {} at {} Hz: {}",
                alignment.name(),
                order.order(),
                freq,
                magnitude
            );
        }
    }
}

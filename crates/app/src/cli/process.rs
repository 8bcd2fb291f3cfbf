//! The `process` command: the application loop around the pipeline

use anyhow::Context;
use bandsplit_core::domain::config::BandsplitConfig;
use bandsplit_core::domain::pipeline::Pipeline;
use bandsplit_infra::audio::{block_link, Offer, PcmReader, PcmWriter};
use serde_json::json;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct Options {
    pub input: PathBuf,
    pub output: PathBuf,
    pub bypass: bool,
    pub realtime: bool,
    pub json: bool,
}

#[derive(Debug, Default)]
struct Report {
    frames: u64,
    overruns: u64,
    elapsed: Duration,
}

pub async fn run(config: BandsplitConfig, options: Options) -> anyhow::Result<()> {
    let mut pipeline = Pipeline::with_settings(config.engine.clone(), &config.processing)
        .context("Failed to build pipeline")?;
    pipeline.set_bypass(options.bypass || config.bypass);

    let input = File::open(&options.input)
        .with_context(|| format!("Failed to open {}", options.input.display()))?;
    let output = File::create(&options.output)
        .with_context(|| format!("Failed to create {}", options.output.display()))?;
    let reader = PcmReader::new(BufReader::new(input), config.engine.block_frames);
    let writer = PcmWriter::new(BufWriter::new(output));

    info!(
        input = %options.input.display(),
        output = %options.output.display(),
        bypass = pipeline.is_bypassed(),
        realtime = options.realtime,
        "Processing"
    );

    let realtime = options.realtime;
    let (pipeline, report) = tokio::task::spawn_blocking(move || {
        let report = if realtime {
            run_paced(&mut pipeline, reader, writer)
        } else {
            run_offline(&mut pipeline, reader, writer)
        };
        report.map(|report| (pipeline, report))
    })
    .await
    .context("Processing task panicked")??;

    let stats = pipeline.statistics();
    let block_period = pipeline.config().block_period();

    if options.json {
        let summary = json!({
            "frames": report.frames,
            "overruns": report.overruns,
            "elapsed_ms": report.elapsed.as_secs_f64() * 1000.0,
            "block_load": stats.block_load(block_period),
            "statistics": stats,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!(
            frames = report.frames,
            blocks = stats.blocks_processed,
            clipped = stats.clipped_samples,
            overruns = report.overruns,
            elapsed_ms = report.elapsed.as_millis() as u64,
            max_gain_reduction_db = stats.max_gain_reduction_db(),
            "Processing finished"
        );
    }
    if report.overruns > 0 {
        warn!(overruns = report.overruns, "Blocks were dropped");
    }

    Ok(())
}

/// Process as fast as the input can be read
fn run_offline<R: Read, W: Write>(
    pipeline: &mut Pipeline,
    mut reader: PcmReader<R>,
    mut writer: PcmWriter<W>,
) -> anyhow::Result<Report> {
    let started = Instant::now();
    let mut input = vec![0i16; reader.block_samples()];
    let mut output = vec![0i16; input.len()];

    loop {
        let frames = reader.read_block(&mut input)?;
        if frames == 0 {
            break;
        }
        pipeline.process_block(&input, &mut output);
        writer.write_frames(&output, frames)?;
    }
    writer.flush()?;

    Ok(Report {
        frames: writer.frames_written(),
        overruns: 0,
        elapsed: started.elapsed(),
    })
}

/// Feed blocks at the sample rate through a block link
///
/// A capture thread offers one block per block period, as the converter
/// would. Blocks offered while the previous one is still pending are lost
/// and counted as overruns. Output keeps the padded final block.
fn run_paced<R: Read + Send, W: Write>(
    pipeline: &mut Pipeline,
    mut reader: PcmReader<R>,
    mut writer: PcmWriter<W>,
) -> anyhow::Result<Report> {
    let started = Instant::now();
    let period = pipeline.config().block_period();
    let block_samples = reader.block_samples();
    let (producer, consumer) = block_link(block_samples);
    let stats = consumer.stats();

    let captured = thread::scope(|scope| -> anyhow::Result<u64> {
        let capture = scope.spawn(move || -> anyhow::Result<u64> {
            let mut deadline = Instant::now();
            let mut frames = 0u64;
            loop {
                let mut block = producer.acquire();
                let read = reader.read_block(&mut block)?;
                if read == 0 {
                    break;
                }
                frames += read as u64;

                deadline += period;
                if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                    thread::sleep(wait);
                }
                if let Offer::Overrun(_) = producer.offer(block)? {
                    debug!(frames, "Block dropped");
                }
            }
            Ok(frames)
        });

        let mut output = vec![0i16; block_samples];
        while let Some(block) = consumer.recv() {
            output.resize(block.len(), 0);
            pipeline.process_block(&block, &mut output);
            writer.write_block(&output)?;
            consumer.recycle(block);
        }

        capture
            .join()
            .map_err(|_| anyhow::anyhow!("Capture thread panicked"))?
    })?;
    writer.flush()?;

    debug!(captured, delivered = stats.delivered(), "Paced run complete");
    Ok(Report {
        frames: writer.frames_written(),
        overruns: stats.overruns(),
        elapsed: started.elapsed(),
    })
}

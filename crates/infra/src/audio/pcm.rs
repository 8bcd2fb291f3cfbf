//! Raw PCM block I/O
//!
//! Reads and writes headerless signed 16-bit little-endian interleaved
//! stereo, one pipeline block at a time. The last block of a stream is
//! zero-padded to the full block size.

use bandsplit_core::domain::audio::{AudioError, CHANNELS};
use std::io::{ErrorKind, Read, Write};
use thiserror::Error;
use tracing::{debug, warn};

const BYTES_PER_SAMPLE: usize = std::mem::size_of::<i16>();

/// Errors raised while moving PCM data in or out
#[derive(Debug, Error)]
pub enum PcmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

pub type Result<T> = std::result::Result<T, PcmError>;

/// Block reader over any byte source
pub struct PcmReader<R> {
    inner: R,
    block_samples: usize,
    bytes: Vec<u8>,
    frames_read: u64,
    finished: bool,
}

impl<R: Read> PcmReader<R> {
    pub fn new(inner: R, block_frames: usize) -> Self {
        let block_samples = block_frames * CHANNELS;
        Self {
            inner,
            block_samples,
            bytes: vec![0; block_samples * BYTES_PER_SAMPLE],
            frames_read: 0,
            finished: false,
        }
    }

    /// Interleaved samples per block
    pub fn block_samples(&self) -> usize {
        self.block_samples
    }

    /// Frames delivered so far, padding excluded
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Fill `block` with the next block of samples
    ///
    /// Returns the number of frames taken from the source; 0 means the
    /// source is exhausted. A short read is padded with silence.
    pub fn read_block(&mut self, block: &mut [i16]) -> Result<usize> {
        if block.len() != self.block_samples {
            return Err(AudioError::BlockSize {
                expected: self.block_samples,
                actual: block.len(),
            }
            .into());
        }
        if self.finished {
            block.fill(0);
            return Ok(0);
        }

        let filled = self.fill_bytes()?;
        if filled < self.bytes.len() {
            self.finished = true;
            if filled % BYTES_PER_SAMPLE != 0 {
                warn!(filled, "Dropping trailing odd byte at end of stream");
            }
        }

        let samples = filled / BYTES_PER_SAMPLE;
        for (sample, bytes) in block
            .iter_mut()
            .zip(self.bytes.chunks_exact(BYTES_PER_SAMPLE))
            .take(samples)
        {
            *sample = i16::from_le_bytes([bytes[0], bytes[1]]);
        }
        block[samples..].fill(0);

        let frames = samples.div_ceil(CHANNELS);
        self.frames_read += frames as u64;
        if self.finished {
            debug!(frames_read = self.frames_read, "Reached end of PCM stream");
        }
        Ok(frames)
    }

    fn fill_bytes(&mut self) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < self.bytes.len() {
            match self.inner.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Block writer over any byte sink
pub struct PcmWriter<W: Write> {
    inner: W,
    bytes: Vec<u8>,
    frames_written: u64,
}

impl<W: Write> PcmWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes: Vec::new(),
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Write the first `frames` frames of an interleaved block
    ///
    /// Used to drop the padding of the last block.
    pub fn write_frames(&mut self, block: &[i16], frames: usize) -> Result<()> {
        let samples = (frames * CHANNELS).min(block.len());

        self.bytes.clear();
        for sample in &block[..samples] {
            self.bytes.extend_from_slice(&sample.to_le_bytes());
        }
        self.inner.write_all(&self.bytes)?;

        self.frames_written += (samples / CHANNELS) as u64;
        Ok(())
    }

    /// Write a whole interleaved block
    pub fn write_block(&mut self, block: &[i16]) -> Result<()> {
        self.write_frames(block, block.len() / CHANNELS)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

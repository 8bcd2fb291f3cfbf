//! Producer/consumer block hand-off
//!
//! Stands in for the converter's "block ready" flag: the producer side
//! (capture) offers one interleaved block at a time and the consumer side
//! (the processing loop) takes it. Only one block may be in flight. When
//! the producer offers a block while the previous one is still unconsumed,
//! the offer is refused and counted as an overrun, which is the deadline
//! miss the processing core surfaces but cannot detect itself.
//!
//! Consumed buffers can be handed back through a recycle path so a steady
//! stream allocates nothing.

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Interleaved stereo block
pub type Block = Vec<i16>;

/// Buffers kept on the recycle path
const RECYCLE_DEPTH: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("Block link disconnected")]
    Disconnected,
}

/// Outcome of offering a block to the consumer
#[derive(Debug, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    /// Previous block still pending; the refused block is handed back
    Overrun(Block),
}

/// Counters shared by both ends of a link
#[derive(Debug, Default)]
pub struct LinkStats {
    offered: CachePadded<AtomicU64>,
    delivered: CachePadded<AtomicU64>,
    overruns: CachePadded<AtomicU64>,
}

impl LinkStats {
    pub fn offered(&self) -> u64 {
        self.offered.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

/// Create a link for blocks of `block_samples` interleaved samples
pub fn block_link(block_samples: usize) -> (BlockProducer, BlockConsumer) {
    let (ready_tx, ready_rx) = bounded(1);
    let (free_tx, free_rx) = bounded(RECYCLE_DEPTH);
    let stats = Arc::new(LinkStats::default());

    debug!(block_samples, "Block link created");

    (
        BlockProducer {
            ready: ready_tx,
            free: free_rx,
            block_samples,
            stats: Arc::clone(&stats),
        },
        BlockConsumer {
            ready: ready_rx,
            free: free_tx,
            stats,
        },
    )
}

/// Capture side of a link
pub struct BlockProducer {
    ready: Sender<Block>,
    free: Receiver<Block>,
    block_samples: usize,
    stats: Arc<LinkStats>,
}

impl BlockProducer {
    /// A zeroed block, reusing a recycled buffer when one is available
    pub fn acquire(&self) -> Block {
        match self.free.try_recv() {
            Ok(mut block) => {
                block.clear();
                block.resize(self.block_samples, 0);
                block
            }
            Err(_) => vec![0; self.block_samples],
        }
    }

    /// Hand a filled block to the consumer without waiting
    pub fn offer(&self, block: Block) -> Result<Offer, LinkError> {
        self.stats.offered.fetch_add(1, Ordering::Relaxed);
        match self.ready.try_send(block) {
            Ok(()) => Ok(Offer::Accepted),
            Err(TrySendError::Full(block)) => {
                let overruns = self.stats.overruns.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(overruns, "Block overrun: previous block not yet consumed");
                Ok(Offer::Overrun(block))
            }
            Err(TrySendError::Disconnected(_)) => Err(LinkError::Disconnected),
        }
    }

    pub fn stats(&self) -> Arc<LinkStats> {
        Arc::clone(&self.stats)
    }
}

/// Processing side of a link
pub struct BlockConsumer {
    ready: Receiver<Block>,
    free: Sender<Block>,
    stats: Arc<LinkStats>,
}

impl BlockConsumer {
    /// Wait for the next block; `None` once the producer is gone
    pub fn recv(&self) -> Option<Block> {
        let block = self.ready.recv().ok()?;
        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        Some(block)
    }

    /// Wait up to `timeout` for the next block
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Block>, LinkError> {
        match self.ready.recv_timeout(timeout) {
            Ok(block) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                Ok(Some(block))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::Disconnected),
        }
    }

    /// Take a pending block if there is one
    pub fn try_recv(&self) -> Result<Option<Block>, LinkError> {
        match self.ready.try_recv() {
            Ok(block) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                Ok(Some(block))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::Disconnected),
        }
    }

    /// Return a consumed buffer to the producer
    ///
    /// Dropped silently when the recycle path is full or closed.
    pub fn recycle(&self, block: Block) {
        let _ = self.free.try_send(block);
    }

    pub fn stats(&self) -> Arc<LinkStats> {
        Arc::clone(&self.stats)
    }
}

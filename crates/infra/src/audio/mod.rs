//! Block I/O around the processing core
//!
//! - `pcm`: raw s16le block reader/writer
//! - `transport`: single-slot producer/consumer link with overrun counting

pub mod pcm;
pub mod transport;

pub use pcm::{PcmError, PcmReader, PcmWriter};
pub use transport::{block_link, Block, BlockConsumer, BlockProducer, LinkError, LinkStats, Offer};

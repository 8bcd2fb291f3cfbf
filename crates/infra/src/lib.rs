//! Bandsplit infrastructure: moving blocks in and out of the processing core

pub mod audio;

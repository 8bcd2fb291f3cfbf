//! Bandsplit core: a four-band stereo crossover processor
//!
//! Everything here is pure processing. Block I/O lives in `bandsplit-infra`
//! and the command-line front end in `bandsplit-app`.

pub mod domain;

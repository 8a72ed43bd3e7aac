//! Benchmark helpers for segwal.

#![warn(missing_docs)]

pub mod utils;

//! Shared utilities

pub mod decompression;

pub use decompression::{CompressionFormat, DecompressionService};

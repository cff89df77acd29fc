//! Test utilities for the orcsplit crates.
//!
//! This crate provides:
//! - `OrcFileBuilder`: writes files with a valid ORC tail around test stripe payloads
//! - `CountingReadAt`: a `ReadAt` wrapper that records the reads issued against it
//! - Small record batch generators
//!
//! Stripe payloads are newline-delimited JSON rather than real ORC stripe streams.
//! The tail (PostScript, Footer, stripe directory) follows the ORC layout exactly,
//! so anything that only interprets file metadata sees a regular ORC file.

pub mod counting_read;
pub mod data_gen;
pub mod orc_file;

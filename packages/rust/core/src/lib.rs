//! End-to-end docset generation pipeline.
//!
//! This crate wires the stage crates together: fetch → transform → index →
//! assemble → archive. The entry point is [`pipeline::generate`].

pub mod pipeline;

pub use pipeline::{GenerateConfig, ProgressReporter, SilentProgress, generate};

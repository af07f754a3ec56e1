//! Text-to-audio generation.
//!
//! Validates a request, drives a generator and normalizes its output to
//! the response sample rate.

pub mod pipeline;

pub use pipeline::generate;

//! Audio capture and analysis
//!
//! This module contains the capture side of the pipeline:
//! - capture-source contract and session glue ([`capture`])
//! - microphone capture via cpal ([`microphone`])
//! - dominant-frequency and loudness estimation ([`spectrum`])
//! - synthetic test-signal generation ([`signal`])

pub mod capture;
pub mod microphone;
pub mod signal;
pub mod spectrum;

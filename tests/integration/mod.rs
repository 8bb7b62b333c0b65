//! Integration Tests Module
//!
//! End-to-end tests that run a whole block through the analyser.

pub mod block_analysis;

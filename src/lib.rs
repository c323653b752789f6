//! COLDSWEEP: exchange-to-cold-storage sweeping agent.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod exchanges;
pub mod alerts;
pub mod engine;

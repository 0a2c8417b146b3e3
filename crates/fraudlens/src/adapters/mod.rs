// Rust guideline compliant 2026-07-11

//! Concrete adapters for the hexagonal ports.
//!
//! The pipeline crates depend only on the `domain` port traits; everything
//! here is swappable wiring owned by the binary.

pub mod memory_log;
pub mod memory_state;
pub mod tracing_sink;

//! # lfring-test-support
//!
//! Testing infrastructure for the lfring ring buffers.
//!
//! ## Components
//!
//! - **StressRunner** - Timed producer/consumer runs against any buffer variant
//! - **DataVerifier** - Exactly-once delivery accounting
//! - **SequenceChecker** - Per-producer FIFO checks for single-consumer runs

pub mod stress;
pub mod verify;

pub use stress::{ print_summary, StressConfig, StressCounters, StressMetrics, StressRunner };
pub use verify::{ decode, encode, DataVerifier, SequenceChecker };

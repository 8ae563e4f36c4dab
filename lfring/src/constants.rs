//! Lfring Constants
//!
//! Core constants used by the ring buffer implementations.

/// Default requested capacity (rounded up to a power of two by the factory)
pub const DEFAULT_CAPACITY: u64 = 1024;

/// Alignment used to keep hot counters and nodes on separate cache lines.
/// 128 bytes covers the adjacent-line prefetcher on x86 and Apple Silicon lines.
pub const CACHE_LINE_SIZE: usize = 128;

/// Environment variable read by `RingBufferConfig::from_env` for the capacity
pub const ENV_CAPACITY: &str = "LFRING_CAPACITY";

/// Environment variable read by `RingBufferConfig::from_env` for the variant
pub const ENV_VARIANT: &str = "LFRING_VARIANT";

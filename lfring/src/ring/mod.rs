//! Lock-free bounded ring buffers.
//!
//! - `ClassicalRingBuffer<T>` - two counters, CAS on `head`/`tail`, slot occupancy flags
//! - `NodeBasedRingBuffer<T>` - per-node generation stamps (bounded MPMC queue)
//! - `AnyRingBuffer<T>` - either of the above, as built by [`new`]
//!
//! Every operation is a single bounded attempt. Full, empty and lost races are
//! reported through the return value and the caller decides how to retry.

pub mod capacity;
pub mod classical;
pub mod node_based;
pub mod factory;
mod padded;

pub use capacity::find_power_of_two;
pub use classical::ClassicalRingBuffer;
pub use node_based::NodeBasedRingBuffer;
pub use factory::{ new, from_config, AnyRingBuffer };

use std::fmt;
use std::str::FromStr;

use crate::constants::{ DEFAULT_CAPACITY, ENV_CAPACITY, ENV_VARIANT };
use crate::error::{ Result, LfringError };

/// Sequence number type for `head`/`tail` positions
pub type Sequence = u64;

/// Operations shared by every ring buffer variant.
///
/// `offer` and `poll` are safe to call from any number of threads. The
/// `single_*` operations require the caller to be the only producer
/// (respectively the only consumer) for the duration of the call; breaking
/// that precondition does not cause memory unsafety but the results are
/// meaningless.
pub trait RingBuffer<T: Send>: Send + Sync {
    /// Try to append `value`.
    ///
    /// Returns the value back in `Err` when the buffer is full or another
    /// producer won the race for the slot.
    fn offer(&self, value: T) -> std::result::Result<(), T>;

    /// Try to take the oldest value. `None` when empty or when another
    /// consumer won the race.
    fn poll(&self) -> Option<T>;

    /// Single-producer fast path. `supplier` returns `None` to finish.
    fn single_producer_offer<F>(&self, supplier: F) where F: FnMut() -> Option<T>;

    /// Single-consumer fast path, invoking `consumer` per value.
    fn single_consumer_poll<F>(&self, consumer: F) where F: FnMut(T);

    /// Single-consumer bulk drain into `out[0..n]`, returning `n`.
    fn single_consumer_poll_vec(&self, out: &mut [T]) -> usize;

    /// Normalized capacity (a power of two)
    fn capacity(&self) -> u64;
}

/// Algorithm selected at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferType {
    /// Two-counter CAS buffer with occupancy-checked slots
    #[default]
    Classical,
    /// Stamped-node buffer
    NodeBased,
}

impl BufferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BufferType::Classical => "classical",
            BufferType::NodeBased => "node-based",
        }
    }
}

impl fmt::Display for BufferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BufferType {
    type Err = LfringError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classical" | "hybrid" => Ok(BufferType::Classical),
            "node-based" | "node_based" | "nodebased" | "mpmc" => Ok(BufferType::NodeBased),
            _ => Err(LfringError::unknown_buffer_type(s)),
        }
    }
}

/// Configuration for ring buffer construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingBufferConfig {
    /// Algorithm to build
    pub variant: BufferType,
    /// Requested capacity, rounded up to a power of two at construction
    pub capacity: u64,
}

impl Default for RingBufferConfig {
    fn default() -> Self {
        Self {
            variant: BufferType::default(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl RingBufferConfig {
    /// Create a new configuration with the specified requested capacity
    pub fn new(capacity: u64) -> Result<Self> {
        // 0, 1 and anything above 2^63 (which wraps to 0) normalize below 2
        if find_power_of_two(capacity) < 2 {
            return Err(
                LfringError::config(format!("Ring buffer capacity {capacity} must round up to a power of 2 of at least 2"))
            );
        }

        Ok(Self {
            capacity,
            ..Default::default()
        })
    }

    /// Set the algorithm variant
    pub fn with_variant(mut self, variant: BufferType) -> Self {
        self.variant = variant;
        self
    }

    /// Capacity the buffer will actually have
    pub fn normalized_capacity(&self) -> u64 {
        find_power_of_two(self.capacity)
    }

    /// Read `LFRING_CAPACITY` and `LFRING_VARIANT`, falling back to defaults
    /// for unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self> where F: Fn(&str) -> Option<String> {
        let mut config = match lookup(ENV_CAPACITY) {
            Some(raw) => {
                let capacity = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| LfringError::config(format!("{ENV_CAPACITY}={raw:?}: {e}")))?;
                Self::new(capacity)?
            }
            None => Self::default(),
        };
        if let Some(raw) = lookup(ENV_VARIANT) {
            config.variant = raw.parse()?;
        }
        Ok(config)
    }
}

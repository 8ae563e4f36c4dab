//! # lfring
//!
//! Fixed-capacity lock-free ring buffers for handing values between threads.
//!
//! Two algorithms, selected at construction:
//!
//! - [`BufferType::Classical`] - `head`/`tail` counters advanced by CAS, with
//!   per-slot occupancy flags; holds `capacity - 1` values.
//! - [`BufferType::NodeBased`] - per-node generation stamps; holds `capacity`
//!   values.
//!
//! Every operation is one bounded, non-blocking attempt:
//!
//! ```
//! use lfring::{ BufferType, RingBuffer };
//!
//! let ring = lfring::new::<u32>(BufferType::Classical, 10).unwrap();
//! assert_eq!(ring.capacity(), 16);
//!
//! assert!(ring.offer(1).is_ok());
//! assert_eq!(ring.poll(), Some(1));
//! assert_eq!(ring.poll(), None);
//! ```

pub mod constants;
pub mod error;
pub mod insights;
pub mod ring;
mod sync;

pub use error::{ LfringError, Result };
pub use insights::init_logging;
pub use ring::{
    find_power_of_two,
    from_config,
    new,
    AnyRingBuffer,
    BufferType,
    ClassicalRingBuffer,
    NodeBasedRingBuffer,
    RingBuffer,
    RingBufferConfig,
    Sequence,
};

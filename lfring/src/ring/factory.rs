//! Buffer factory.
//!
//! Normalizes the requested capacity and builds the chosen algorithm behind
//! [`AnyRingBuffer`], which dispatches statically to the concrete buffer.

use crate::error::{ LfringError, Result };
use crate::insights;
use crate::ring::{
    find_power_of_two,
    BufferType,
    ClassicalRingBuffer,
    NodeBasedRingBuffer,
    RingBuffer,
    RingBufferConfig,
};

/// Build a ring buffer of `variant` holding `requested` rounded up to a
/// power of two.
///
/// The rounding is silent: `new(BufferType::Classical, 10)` has capacity 16.
/// Fails when the normalized capacity is below 2, which covers a request of
/// 0, 1, and anything above 2^63 (the rounding wraps to 0).
///
/// ```
/// use lfring::{ BufferType, RingBuffer };
///
/// let ring = lfring::new::<u64>(BufferType::NodeBased, 10).unwrap();
/// assert_eq!(ring.capacity(), 16);
/// assert!(ring.offer(7).is_ok());
/// assert_eq!(ring.poll(), Some(7));
/// ```
pub fn new<T: Send>(variant: BufferType, requested: u64) -> Result<AnyRingBuffer<T>> {
    let capacity = find_power_of_two(requested);
    if capacity == 0 {
        return Err(
            LfringError::config(format!("Requested capacity {requested} cannot be rounded to a power of 2"))
        );
    }

    let ring = match variant {
        BufferType::Classical => AnyRingBuffer::Classical(ClassicalRingBuffer::with_capacity(capacity)?),
        BufferType::NodeBased => AnyRingBuffer::NodeBased(NodeBasedRingBuffer::with_capacity(capacity)?),
    };
    insights::record_construct(variant.as_str(), requested, capacity);
    Ok(ring)
}

/// Build a ring buffer from a [`RingBufferConfig`].
pub fn from_config<T: Send>(config: &RingBufferConfig) -> Result<AnyRingBuffer<T>> {
    new(config.variant, config.capacity)
}

/// A ring buffer of either algorithm.
#[derive(Debug)]
pub enum AnyRingBuffer<T> {
    Classical(ClassicalRingBuffer<T>),
    NodeBased(NodeBasedRingBuffer<T>),
}

impl<T> AnyRingBuffer<T> {
    pub fn buffer_type(&self) -> BufferType {
        match self {
            AnyRingBuffer::Classical(_) => BufferType::Classical,
            AnyRingBuffer::NodeBased(_) => BufferType::NodeBased,
        }
    }

    /// Advisory number of live values
    pub fn len(&self) -> u64 {
        match self {
            AnyRingBuffer::Classical(r) => r.len(),
            AnyRingBuffer::NodeBased(r) => r.len(),
        }
    }

    /// Advisory emptiness snapshot
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send> RingBuffer<T> for AnyRingBuffer<T> {
    #[inline]
    fn offer(&self, value: T) -> std::result::Result<(), T> {
        match self {
            AnyRingBuffer::Classical(r) => r.offer(value),
            AnyRingBuffer::NodeBased(r) => r.offer(value),
        }
    }

    #[inline]
    fn poll(&self) -> Option<T> {
        match self {
            AnyRingBuffer::Classical(r) => r.poll(),
            AnyRingBuffer::NodeBased(r) => r.poll(),
        }
    }

    fn single_producer_offer<F>(&self, supplier: F) where F: FnMut() -> Option<T> {
        match self {
            AnyRingBuffer::Classical(r) => r.single_producer_offer(supplier),
            AnyRingBuffer::NodeBased(r) => r.single_producer_offer(supplier),
        }
    }

    fn single_consumer_poll<F>(&self, consumer: F) where F: FnMut(T) {
        match self {
            AnyRingBuffer::Classical(r) => r.single_consumer_poll(consumer),
            AnyRingBuffer::NodeBased(r) => r.single_consumer_poll(consumer),
        }
    }

    fn single_consumer_poll_vec(&self, out: &mut [T]) -> usize {
        match self {
            AnyRingBuffer::Classical(r) => r.single_consumer_poll_vec(out),
            AnyRingBuffer::NodeBased(r) => r.single_consumer_poll_vec(out),
        }
    }

    fn capacity(&self) -> u64 {
        match self {
            AnyRingBuffer::Classical(r) => r.capacity(),
            AnyRingBuffer::NodeBased(r) => r.capacity(),
        }
    }
}

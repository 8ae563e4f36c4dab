//! Classical Ring Buffer
//!
//! Lock-free ring buffer coordinated by two monotonically increasing counters.
//! Producers CAS `tail`, consumers CAS `head`; each slot carries an occupancy
//! flag that is set after the value is written and cleared after it is read.
//!
//! ## Layout
//!
//! The slot for sequence `s` is `s & mask`. `head` and `tail` both start at 0
//! and the first value lands in slot 1: an offer writes `tail + 1`, a poll
//! reads `head + 1`. At most `capacity - 1` values are live at once.
//!
//! ## Racy dual reads
//!
//! `tail` and `head` are two independent atomics, so a thread can observe a
//! `tail` that is behind `head`. That never holds in the real state, and both
//! checks resolve it conservatively:
//!
//! - `is_full`: `tail - head` (wrapping) is huge, so the offer fails and the
//!   producer's CAS would have failed anyway.
//! - `is_empty`: `tail` behind `head` counts as empty. Reading on under that
//!   view could return a value a previous-lap consumer has not cleared yet.
//!
//! "Behind" is judged modularly: the real distance never exceeds
//! `capacity - 1`, so any wrapped distance of `capacity` or more is the racy
//! artifact. The counters can therefore wrap the full `u64` width.
//!
//! ## Memory Ordering
//!
//! - value write, then `full.store(true, Release)`; consumers `Acquire` the flag
//! - value read, then `full.store(false, Release)`; producers `Acquire` the flag
//! - the CAS on `tail`/`head` is the single arbitration point per sequence

use std::fmt;
use std::mem::MaybeUninit;

use crate::error::{ LfringError, Result };
use crate::ring::padded::PaddedAtomicU64;
use crate::ring::{ RingBuffer, Sequence };
use crate::sync::{ AtomicBool, AtomicU64, Ordering, UnsafeCell };

struct Slot<T> {
    full: AtomicBool,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            full: AtomicBool::new(false),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    #[inline(always)]
    fn is_full(&self) -> bool {
        self.full.load(Ordering::Acquire)
    }

    /// # Safety
    /// Caller owns the slot for writing: it won the `tail` CAS for this
    /// sequence (or is the sole producer) and observed `full == false`.
    #[inline(always)]
    unsafe fn write(&self, value: T) {
        self.value.with_mut(|p| {
            (*p).write(value);
        });
        self.full.store(true, Ordering::Release);
    }

    /// # Safety
    /// Caller owns the slot for reading: it won the `head` CAS for this
    /// sequence (or is the sole consumer) and observed `full == true`.
    #[inline(always)]
    unsafe fn take(&self) -> T {
        let value = self.value.with(|p| (*p).assume_init_read());
        self.full.store(false, Ordering::Release);
        value
    }
}

/// Publishes a locally advanced counter with one store when dropped, so a
/// panicking supplier or consumer callback cannot strand written or cleared
/// slots behind an unpublished counter.
struct CursorPublisher<'a> {
    cursor: &'a AtomicU64,
    position: u64,
}

impl<'a> CursorPublisher<'a> {
    fn new(cursor: &'a AtomicU64, position: u64) -> Self {
        Self { cursor, position }
    }

    #[inline(always)]
    fn advance(&mut self) {
        self.position = self.position.wrapping_add(1);
    }
}

impl Drop for CursorPublisher<'_> {
    fn drop(&mut self) {
        self.cursor.store(self.position, Ordering::Release);
    }
}

/// Two-counter CAS ring buffer. See the module docs for the protocol.
pub struct ClassicalRingBuffer<T> {
    head: PaddedAtomicU64,
    tail: PaddedAtomicU64,
    capacity: u64,
    mask: u64,
    slots: Box<[Slot<T>]>,
}

impl<T> ClassicalRingBuffer<T> {
    /// Build a buffer with exactly `capacity` slots.
    ///
    /// `capacity` must already be a power of two and at least 2: one slot is
    /// always the gap, so a single-slot ring could never accept a value.
    pub fn with_capacity(capacity: u64) -> Result<Self> {
        if !capacity.is_power_of_two() {
            return Err(LfringError::config("Capacity must be power of 2"));
        }
        if capacity < 2 {
            return Err(LfringError::config("Classical ring buffer needs at least 2 slots"));
        }
        let len = usize::try_from(capacity)
            .map_err(|_| LfringError::config("Capacity exceeds addressable memory"))?;

        let slots = (0..len).map(|_| Slot::new()).collect::<Vec<_>>().into_boxed_slice();

        Ok(Self {
            head: PaddedAtomicU64::new(0),
            tail: PaddedAtomicU64::new(0),
            capacity,
            mask: capacity - 1,
            slots,
        })
    }

    #[inline(always)]
    fn slot(&self, sequence: u64) -> &Slot<T> {
        &self.slots[(sequence & self.mask) as usize]
    }

    /// `tail - head >= capacity - 1`, wrapping. A racy `tail < head` view
    /// wraps to a huge difference and also reports full.
    #[inline(always)]
    fn is_full_at(&self, tail: u64, head: u64) -> bool {
        tail.wrapping_sub(head) >= self.capacity - 1
    }

    /// `tail == head`, or `tail` behind `head` (racy view): both report empty.
    #[inline(always)]
    fn is_empty_at(&self, tail: u64, head: u64) -> bool {
        let distance = tail.wrapping_sub(head);
        distance == 0 || distance >= self.capacity
    }

    /// Number of values offered but not yet polled. Advisory under concurrency.
    pub fn len(&self) -> u64 {
        // head first: tail is monotonic, so the later tail load is >= this head.
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head).min(self.capacity - 1)
    }

    /// Advisory emptiness snapshot.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current `head` counter
    pub fn head(&self) -> Sequence {
        self.head.load(Ordering::Acquire)
    }

    /// Current `tail` counter
    pub fn tail(&self) -> Sequence {
        self.tail.load(Ordering::Acquire)
    }

    /// Drain up to `limit` consecutive published values starting at `head + 1`
    /// and publish the new `head` once.
    fn drain<F>(&self, limit: usize, mut consumer: F) -> usize where F: FnMut(T) {
        let old_tail = self.tail.load(Ordering::Acquire);
        let old_head = self.head.load(Ordering::Relaxed);
        if limit == 0 || self.is_empty_at(old_tail, old_head) {
            return 0;
        }

        let budget = old_tail.wrapping_sub(old_head).min(limit as u64);
        let mut cursor = CursorPublisher::new(&self.head, old_head);
        while cursor.position.wrapping_sub(old_head) < budget {
            let slot = self.slot(cursor.position.wrapping_add(1));
            // not published yet
            if !slot.is_full() {
                break;
            }
            // SAFETY: sole consumer, and the slot is published.
            let value = unsafe { slot.take() };
            cursor.advance();
            consumer(value);
        }
        cursor.position.wrapping_sub(old_head) as usize
    }
}

impl<T: Send> RingBuffer<T> for ClassicalRingBuffer<T> {
    fn offer(&self, value: T) -> std::result::Result<(), T> {
        let old_tail = self.tail.load(Ordering::Acquire);
        let old_head = self.head.load(Ordering::Acquire);
        if self.is_full_at(old_tail, old_head) {
            return Err(value);
        }

        let new_tail = old_tail.wrapping_add(1);
        let slot = self.slot(new_tail);
        // previous lap not drained yet
        if slot.is_full() {
            return Err(value);
        }
        if self.tail
            .compare_exchange(old_tail, new_tail, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return Err(value); // Another producer won
        }

        // SAFETY: the CAS made this thread the only producer for `new_tail`,
        // and the slot was observed empty.
        unsafe { slot.write(value) };
        Ok(())
    }

    fn poll(&self) -> Option<T> {
        let old_tail = self.tail.load(Ordering::Acquire);
        let old_head = self.head.load(Ordering::Acquire);
        if self.is_empty_at(old_tail, old_head) {
            return None;
        }

        let new_head = old_head.wrapping_add(1);
        let slot = self.slot(new_head);
        // not published yet
        if !slot.is_full() {
            return None;
        }
        if self.head
            .compare_exchange(old_head, new_head, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return None; // Another consumer won
        }

        // SAFETY: the CAS made this thread the only consumer for `new_head`,
        // and the slot was observed published.
        Some(unsafe { slot.take() })
    }

    fn single_producer_offer<F>(&self, mut supplier: F) where F: FnMut() -> Option<T> {
        let old_tail = self.tail.load(Ordering::Relaxed);
        let old_head = self.head.load(Ordering::Acquire);
        if self.is_full_at(old_tail, old_head) {
            return;
        }

        let mut cursor = CursorPublisher::new(&self.tail, old_tail);
        while cursor.position.wrapping_add(1).wrapping_sub(old_head) < self.capacity {
            let slot = self.slot(cursor.position.wrapping_add(1));
            // previous lap not drained yet
            if slot.is_full() {
                break;
            }
            let Some(value) = supplier() else {
                break;
            };
            // SAFETY: sole producer, and the slot was observed empty.
            unsafe { slot.write(value) };
            cursor.advance();
        }
    }

    fn single_consumer_poll<F>(&self, consumer: F) where F: FnMut(T) {
        self.drain(usize::MAX, consumer);
    }

    fn single_consumer_poll_vec(&self, out: &mut [T]) -> usize {
        let mut filled = 0;
        self.drain(out.len(), |value| {
            out[filled] = value;
            filled += 1;
        })
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }
}

// SAFETY: values move between threads only through the slot protocol above;
// a slot is written by exactly one producer and read by exactly one consumer.
unsafe impl<T: Send> Send for ClassicalRingBuffer<T> {}
unsafe impl<T: Send> Sync for ClassicalRingBuffer<T> {}

impl<T> Drop for ClassicalRingBuffer<T> {
    fn drop(&mut self) {
        for slot in self.slots.iter() {
            if slot.full.load(Ordering::Relaxed) {
                // SAFETY: `&mut self`, so no operation is in flight and a
                // set flag means the value is initialized.
                slot.value.with_mut(|p| unsafe { (*p).assume_init_drop() });
            }
        }
    }
}

impl<T> fmt::Debug for ClassicalRingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassicalRingBuffer")
            .field("capacity", &self.capacity)
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .finish()
    }
}

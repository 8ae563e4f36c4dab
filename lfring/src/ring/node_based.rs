//! Node-Based Ring Buffer
//!
//! Bounded MPMC queue where every node carries its own generation stamp
//! (`step`), after Dmitry Vyukov's bounded MPMC queue. The stamp says which
//! lap owns the node, so neither side needs a global full/empty check:
//!
//! - producer-eligible when `step == tail`
//! - after a producer fills it: `step = tail + 1`
//! - consumer-eligible when `step == head + 1`
//! - after a consumer drains it: `step = step + mask`, which equals the `tail`
//!   a producer will hold one full lap later
//!
//! A full buffer makes every `offer` see an ineligible node, an empty one
//! makes every `poll` see one. The stamp also rules out ABA: a consumer can
//! never read a value from a previous or a future lap because the stamp for
//! those laps differs.
//!
//! Node `i` starts with `step = i`. All `capacity` nodes can hold a value.
//!
//! ## Memory Ordering
//!
//! - value write, then `step.store(tail + 1, Release)`
//! - value read, then `step.store(step + mask, Release)`
//! - both sides `Acquire` the stamp before touching the value

use std::fmt;
use std::mem::MaybeUninit;

use crate::error::{ LfringError, Result };
use crate::insights;
use crate::ring::padded::PaddedAtomicU64;
use crate::ring::{ RingBuffer, Sequence };
use crate::sync::{ backoff, AtomicU64, Ordering, UnsafeCell };

/// One stamped node, on its own cache line
#[repr(align(128))]
struct Node<T> {
    step: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Node<T> {
    fn new(step: u64) -> Self {
        Self {
            step: AtomicU64::new(step),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Stamped-node ring buffer. See the module docs for the protocol.
pub struct NodeBasedRingBuffer<T> {
    head: PaddedAtomicU64,
    tail: PaddedAtomicU64,
    mask: u64,
    nodes: Box<[Node<T>]>,
}

impl<T> NodeBasedRingBuffer<T> {
    /// Build a buffer with exactly `capacity` nodes.
    ///
    /// `capacity` must already be a power of two and at least 2: with a single
    /// node the filled stamp `tail + 1` would equal the next producer's `tail`.
    pub fn with_capacity(capacity: u64) -> Result<Self> {
        if !capacity.is_power_of_two() {
            return Err(LfringError::config("Capacity must be power of 2"));
        }
        if capacity < 2 {
            return Err(LfringError::config("Node-based ring buffer needs at least 2 slots"));
        }
        let len = usize::try_from(capacity)
            .map_err(|_| LfringError::config("Capacity exceeds addressable memory"))?;

        let nodes = (0..len as u64).map(Node::new).collect::<Vec<_>>().into_boxed_slice();

        Ok(Self {
            head: PaddedAtomicU64::new(0),
            tail: PaddedAtomicU64::new(0),
            mask: capacity - 1,
            nodes,
        })
    }

    #[inline(always)]
    fn node(&self, sequence: u64) -> &Node<T> {
        &self.nodes[(sequence & self.mask) as usize]
    }

    /// Number of claimed-but-not-polled values. Advisory under concurrency.
    pub fn len(&self) -> u64 {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head).min(self.mask + 1)
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
}

impl<T: Send> RingBuffer<T> for NodeBasedRingBuffer<T> {
    fn offer(&self, value: T) -> std::result::Result<(), T> {
        let old_tail = self.tail.load(Ordering::Acquire);
        let node = self.node(old_tail);
        // previous lap not drained yet
        if node.step.load(Ordering::Acquire) != old_tail {
            return Err(value);
        }
        if self.tail
            .compare_exchange(old_tail, old_tail.wrapping_add(1), Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return Err(value); // Another producer won
        }

        // SAFETY: the stamp says the node is vacant for this lap and the CAS
        // made this thread its only producer.
        node.value.with_mut(|p| unsafe {
            (*p).write(value);
        });
        node.step.store(old_tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    fn poll(&self) -> Option<T> {
        let old_head = self.head.load(Ordering::Acquire);
        let node = self.node(old_head);
        let step = node.step.load(Ordering::Acquire);
        // not published yet
        if step != old_head.wrapping_add(1) {
            return None;
        }
        if self.head
            .compare_exchange(old_head, old_head.wrapping_add(1), Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return None; // Another consumer won
        }

        // SAFETY: the stamp says a producer published this lap's value and
        // the CAS made this thread its only consumer.
        let value = node.value.with(|p| unsafe { (*p).assume_init_read() });
        node.step.store(step.wrapping_add(self.mask), Ordering::Release);
        Some(value)
    }

    /// Pulls one value from `supplier` and spins on `offer` until accepted.
    fn single_producer_offer<F>(&self, mut supplier: F) where F: FnMut() -> Option<T> {
        let Some(mut value) = supplier() else {
            return;
        };
        let mut spins = 0u64;
        while let Err(back) = self.offer(value) {
            value = back;
            backoff(spins);
            spins += 1;
        }
        insights::record_spin("single_producer_offer", spins);
    }

    /// Spins on `poll` until one value arrives, then hands it to `consumer`.
    fn single_consumer_poll<F>(&self, mut consumer: F) where F: FnMut(T) {
        let mut spins = 0u64;
        let value = loop {
            if let Some(value) = self.poll() {
                break value;
            }
            backoff(spins);
            spins += 1;
        };
        insights::record_spin("single_consumer_poll", spins);
        consumer(value);
    }

    fn single_consumer_poll_vec(&self, out: &mut [T]) -> usize {
        let mut filled = 0;
        while filled < out.len() {
            match self.poll() {
                Some(value) => {
                    out[filled] = value;
                    filled += 1;
                }
                None => break,
            }
        }
        filled
    }

    fn capacity(&self) -> u64 {
        self.mask + 1
    }
}

// SAFETY: a node's value is written by the one producer that won the `tail`
// CAS for its lap and read by the one consumer that won the `head` CAS.
unsafe impl<T: Send> Send for NodeBasedRingBuffer<T> {}
unsafe impl<T: Send> Sync for NodeBasedRingBuffer<T> {}

impl<T> Drop for NodeBasedRingBuffer<T> {
    fn drop(&mut self) {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let mut seq = head;
        while seq != tail {
            let node = self.node(seq);
            // SAFETY: `&mut self`, so every claimed sequence in [head, tail)
            // has been published and not yet polled.
            node.value.with_mut(|p| unsafe { (*p).assume_init_drop() });
            seq = seq.wrapping_add(1);
        }
    }
}

impl<T> fmt::Debug for NodeBasedRingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeBasedRingBuffer")
            .field("capacity", &(self.mask + 1))
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_initial_stamps_match_index() {
        let ring = NodeBasedRingBuffer::<u64>::with_capacity(8).unwrap();
        for (i, node) in ring.nodes.iter().enumerate() {
            assert_eq!(node.step.load(Ordering::Relaxed), i as u64);
        }
        assert_eq!(std::mem::align_of::<Node<u64>>(), 128);
    }

    #[test]
    fn test_stamp_transitions() {
        let ring = NodeBasedRingBuffer::with_capacity(4).unwrap();
        ring.offer(10u64).unwrap();
        // filled: tail + 1
        assert_eq!(ring.nodes[0].step.load(Ordering::Relaxed), 1);

        assert_eq!(ring.poll(), Some(10));
        // drained: step + mask = next lap's tail for node 0
        assert_eq!(ring.nodes[0].step.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_holds_full_capacity() {
        let ring = NodeBasedRingBuffer::with_capacity(16).unwrap();
        for i in 0..16u64 {
            assert!(ring.offer(i).is_ok(), "offer {} should fit", i);
        }
        assert_eq!(ring.offer(16), Err(16));
        assert_eq!(ring.len(), 16);
        for i in 0..16u64 {
            assert_eq!(ring.poll(), Some(i));
        }
        assert_eq!(ring.poll(), None);
    }

    #[test]
    fn test_rejects_bad_capacity() {
        assert!(NodeBasedRingBuffer::<u64>::with_capacity(0).is_err());
        assert!(NodeBasedRingBuffer::<u64>::with_capacity(1).is_err());
        assert!(NodeBasedRingBuffer::<u64>::with_capacity(6).is_err());
    }

    #[test]
    fn test_capacity_two() {
        let ring = NodeBasedRingBuffer::with_capacity(2).unwrap();
        for lap in 0..5u64 {
            ring.offer(lap * 2).unwrap();
            ring.offer(lap * 2 + 1).unwrap();
            assert_eq!(ring.offer(99), Err(99));
            assert_eq!(ring.poll(), Some(lap * 2));
            assert_eq!(ring.poll(), Some(lap * 2 + 1));
            assert_eq!(ring.poll(), None);
        }
    }

    #[test]
    fn test_counters_wrap_native_width() {
        let ring = NodeBasedRingBuffer::with_capacity(4).unwrap();
        let start = u64::MAX - 1;
        ring.head.store(start, Ordering::Relaxed);
        ring.tail.store(start, Ordering::Relaxed);
        for i in 0..4u64 {
            let seq = start.wrapping_add(i);
            ring.node(seq).step.store(seq, Ordering::Relaxed);
        }

        for v in 0..4u64 {
            ring.offer(v).unwrap();
        }
        assert_eq!(ring.offer(4), Err(4));
        for v in 0..4u64 {
            assert_eq!(ring.poll(), Some(v));
        }
        assert_eq!(ring.tail(), 2);
        assert_eq!(ring.head(), 2);
        ring.offer(5).unwrap();
        assert_eq!(ring.poll(), Some(5));
    }

    #[test]
    fn test_single_producer_offer_takes_one_value() {
        let ring = NodeBasedRingBuffer::with_capacity(8).unwrap();
        let mut calls = 0;
        ring.single_producer_offer(|| {
            calls += 1;
            Some(calls)
        });
        assert_eq!(calls, 1);
        assert_eq!(ring.poll(), Some(1));

        ring.single_producer_offer(|| None);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_single_producer_offer_spins_until_space() {
        let ring = Arc::new(NodeBasedRingBuffer::with_capacity(2).unwrap());
        ring.offer(1u64).unwrap();
        ring.offer(2).unwrap();

        let consumer = {
            let ring = ring.clone();
            thread::spawn(move || {
                thread::sleep(std::time::Duration::from_millis(20));
                ring.poll()
            })
        };
        ring.single_producer_offer(|| Some(3));
        assert_eq!(consumer.join().unwrap(), Some(1));
        assert_eq!(ring.poll(), Some(2));
        assert_eq!(ring.poll(), Some(3));
    }

    #[test]
    fn test_single_consumer_poll_waits_for_value() {
        let ring = Arc::new(NodeBasedRingBuffer::with_capacity(8).unwrap());
        let producer = {
            let ring = ring.clone();
            thread::spawn(move || {
                thread::sleep(std::time::Duration::from_millis(20));
                ring.offer(42u64).unwrap();
            })
        };
        let mut seen = Vec::new();
        ring.single_consumer_poll(|v| seen.push(v));
        producer.join().unwrap();
        assert_eq!(seen, vec![42]);
    }

    #[test]
    fn test_single_consumer_poll_vec() {
        let ring = NodeBasedRingBuffer::with_capacity(8).unwrap();
        for i in 0..5u64 {
            ring.offer(i).unwrap();
        }
        let mut out = [0u64; 3];
        assert_eq!(ring.single_consumer_poll_vec(&mut out), 3);
        assert_eq!(out, [0, 1, 2]);
        let mut out = [0u64; 8];
        assert_eq!(ring.single_consumer_poll_vec(&mut out), 2);
        assert_eq!(&out[..2], &[3, 4]);
    }

    #[test]
    fn test_drop_releases_remaining_values() {
        let drops = Arc::new(AtomicUsize::new(0));

        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        {
            let ring = NodeBasedRingBuffer::with_capacity(4).unwrap();
            // lap past the end so the live range wraps the node array
            for _ in 0..3 {
                assert!(ring.offer(Tracked(drops.clone())).is_ok());
                drop(ring.poll());
            }
            for _ in 0..4 {
                assert!(ring.offer(Tracked(drops.clone())).is_ok());
            }
            assert_eq!(drops.load(Ordering::Relaxed), 3);
        }
        assert_eq!(drops.load(Ordering::Relaxed), 7);
    }
}

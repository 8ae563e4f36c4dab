//! Concurrency tests: SPSC ordering and exactly-once delivery under
//! multi-producer / multi-consumer topologies.

#![cfg(not(loom))]

use std::collections::HashSet;
use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::{ Arc, Mutex };
use std::thread;

use lfring::{ new, AnyRingBuffer, BufferType, RingBuffer };

const VARIANTS: [BufferType; 2] = [BufferType::NodeBased, BufferType::Classical];

/// Spin briefly, then yield so oversubscribed hosts keep making progress.
fn backoff(spins: &mut u32) {
    if *spins < 64 {
        *spins += 1;
        std::hint::spin_loop();
    } else {
        thread::yield_now();
    }
}

fn offer_spin<R: RingBuffer<u64>>(ring: &R, value: u64) {
    let mut v = value;
    let mut spins = 0;
    while let Err(back) = ring.offer(v) {
        v = back;
        backoff(&mut spins);
    }
}

/// Runs `producers` threads offering disjoint ranges and `consumers` threads
/// polling until everything arrived. Returns every polled value.
fn run_topology(
    ring: Arc<AnyRingBuffer<u64>>,
    producers: u64,
    consumers: usize,
    per_producer: u64
) -> Vec<u64> {
    let total = producers * per_producer;
    let received = Arc::new(AtomicU64::new(0));
    let results = Arc::new(Mutex::new(Vec::with_capacity(total as usize)));

    let mut handles = vec![];
    for producer_id in 0..producers {
        let ring = ring.clone();
        handles.push(
            thread::spawn(move || {
                let start = producer_id * per_producer;
                for val in start..start + per_producer {
                    offer_spin(&*ring, val);
                }
            })
        );
    }
    for _ in 0..consumers {
        let ring = ring.clone();
        let received = received.clone();
        let results = results.clone();
        handles.push(
            thread::spawn(move || {
                let mut local = Vec::new();
                let mut spins = 0;
                while received.load(Ordering::Acquire) < total {
                    if let Some(v) = ring.poll() {
                        local.push(v);
                        received.fetch_add(1, Ordering::AcqRel);
                        spins = 0;
                    } else {
                        backoff(&mut spins);
                    }
                }
                results.lock().unwrap().extend(local);
            })
        );
    }
    for h in handles {
        h.join().unwrap();
    }

    let values = std::mem::take(&mut *results.lock().unwrap());
    values
}

fn assert_exactly_once(values: &[u64], total: u64, label: &str) {
    assert_eq!(values.len() as u64, total, "{label}: count mismatch - data loss or duplication");
    let unique: HashSet<u64> = values.iter().copied().collect();
    assert_eq!(unique.len() as u64, total, "{label}: duplicates detected");
    assert!(unique.iter().all(|&v| v < total), "{label}: foreign value");
}

#[test]
fn test_spsc_fifo_order() {
    for variant in VARIANTS {
        let ring = Arc::new(new::<u64>(variant, 64).unwrap());
        let count = 100_000u64;

        let producer = {
            let ring = ring.clone();
            thread::spawn(move || {
                for v in 0..count {
                    offer_spin(&*ring, v);
                }
            })
        };

        let mut expected = 0u64;
        let mut spins = 0;
        while expected < count {
            if let Some(v) = ring.poll() {
                assert_eq!(v, expected, "{variant}: ordering error");
                expected += 1;
                spins = 0;
            } else {
                backoff(&mut spins);
            }
        }
        producer.join().unwrap();
        assert!(ring.is_empty());
    }
}

#[test]
fn test_spsc_fast_paths_fifo_order() {
    for variant in VARIANTS {
        let ring = Arc::new(new::<u64>(variant, 128).unwrap());
        let count = 50_000u64;

        let producer = {
            let ring = ring.clone();
            thread::spawn(move || {
                let mut next = 0u64;
                let mut spins = 0;
                while next < count {
                    let before = next;
                    ring.single_producer_offer(|| {
                        if next < count {
                            next += 1;
                            Some(next - 1)
                        } else {
                            None
                        }
                    });
                    if next == before {
                        backoff(&mut spins);
                    } else {
                        spins = 0;
                    }
                }
            })
        };

        let mut expected = 0u64;
        let mut spins = 0;
        let mut out = vec![0u64; 32];
        while expected < count {
            let n = ring.single_consumer_poll_vec(&mut out);
            for &v in &out[..n] {
                assert_eq!(v, expected, "{variant}: ordering error");
                expected += 1;
            }
            if n == 0 {
                backoff(&mut spins);
            } else {
                spins = 0;
            }
        }
        producer.join().unwrap();
    }
}

#[test]
fn test_classical_single_consumer_poll_with_producers() {
    let ring = Arc::new(new::<u64>(BufferType::Classical, 16).unwrap());
    let total = 3 * 5_000u64;

    let mut producers = vec![];
    for id in 0..3u64 {
        let ring = ring.clone();
        producers.push(
            thread::spawn(move || {
                for v in id * 5_000..(id + 1) * 5_000 {
                    offer_spin(&*ring, v);
                }
            })
        );
    }
    let consumer = {
        let ring = ring.clone();
        thread::spawn(move || {
            let mut seen = Vec::new();
            let mut spins = 0;
            while (seen.len() as u64) < total {
                let before = seen.len();
                ring.single_consumer_poll(|v| seen.push(v));
                if seen.len() == before {
                    backoff(&mut spins);
                } else {
                    spins = 0;
                }
            }
            seen
        })
    };
    for p in producers {
        p.join().unwrap();
    }
    let seen = consumer.join().unwrap();
    assert_exactly_once(&seen, total, "classical mpsc single_consumer_poll");
}

#[test]
fn test_mpsc_exactly_once() {
    for variant in VARIANTS {
        let ring = Arc::new(new::<u64>(variant, 4).unwrap());
        let values = run_topology(ring, 3, 1, 8);
        assert_exactly_once(&values, 24, &format!("{variant} mpsc"));
    }
}

#[test]
fn test_spmc_exactly_once() {
    for variant in VARIANTS {
        let ring = Arc::new(new::<u64>(variant, 32).unwrap());
        let values = run_topology(ring, 1, 4, 20_000);
        assert_exactly_once(&values, 20_000, &format!("{variant} spmc"));
    }
}

#[test]
fn test_mpmc_exactly_once() {
    for variant in VARIANTS {
        let ring = Arc::new(new::<u64>(variant, 64).unwrap());
        let values = run_topology(ring.clone(), 4, 4, 10_000);
        assert_exactly_once(&values, 40_000, &format!("{variant} mpmc"));
        assert!(ring.is_empty());
        assert_eq!(ring.poll(), None);
    }
}

#[test]
fn test_mpmc_high_contention_small_ring() {
    for variant in VARIANTS {
        let ring = Arc::new(new::<u64>(variant, 2).unwrap());
        let values = run_topology(ring, 4, 4, 2_000);
        assert_exactly_once(&values, 8_000, &format!("{variant} contended"));
    }
}

#[test]
fn test_mpmc_owned_payloads_not_leaked() {
    for variant in VARIANTS {
        let ring = Arc::new(new::<String>(variant, 16).unwrap());
        let total = 4 * 2_000usize;
        let received = Arc::new(AtomicU64::new(0));

        let mut handles = vec![];
        for id in 0..4 {
            let ring = ring.clone();
            handles.push(
                thread::spawn(move || {
                    for i in 0..2_000 {
                        let mut v = format!("{id}:{i}");
                        let mut spins = 0;
                        while let Err(back) = ring.offer(v) {
                            v = back;
                            backoff(&mut spins);
                        }
                    }
                })
            );
        }
        let consumers: Vec<_> = (0..2)
            .map(|_| {
                let ring = ring.clone();
                let received = received.clone();
                thread::spawn(move || {
                    let mut local = HashSet::new();
                    let mut spins = 0;
                    while (received.load(Ordering::Acquire) as usize) < total {
                        if let Some(v) = ring.poll() {
                            assert!(local.insert(v), "duplicate payload");
                            received.fetch_add(1, Ordering::AcqRel);
                            spins = 0;
                        } else {
                            backoff(&mut spins);
                        }
                    }
                    local
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut all = HashSet::new();
        for c in consumers {
            for v in c.join().unwrap() {
                assert!(all.insert(v), "{variant}: duplicate across consumers");
            }
        }
        assert_eq!(all.len(), total, "{variant}");
    }
}

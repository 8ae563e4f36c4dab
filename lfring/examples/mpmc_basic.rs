//! Sum Calculator - MPMC (4 Producers, 2 Consumers)
//!
//! Each producer sends 250k numbers, consumers sum all 1M.
//!
//! Usage:
//!   cargo run -p lfring --example mpmc_basic --features tracing -- [classical|node-based]

use lfring::{ BufferType, RingBuffer, RingBufferConfig };
use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::Arc;
use std::thread;
use std::time::Instant;

const MESSAGES_PER_PRODUCER: u64 = 250_000;
const NUM_PRODUCERS: u64 = 4;
const NUM_CONSUMERS: usize = 2;
const MAX_NUMBER: u64 = MESSAGES_PER_PRODUCER * NUM_PRODUCERS;

fn main() -> lfring::Result<()> {
    lfring::init_logging();

    let mut config = RingBufferConfig::from_env()?;
    if let Some(tag) = std::env::args().nth(1) {
        config = config.with_variant(tag.parse::<BufferType>()?);
    }
    let ring = Arc::new(lfring::from_config::<u64>(&config)?);

    println!("Task: sum the numbers 1 to {}", MAX_NUMBER);
    println!(
        "Buffer: {} (requested {}, capacity {})\n",
        ring.buffer_type(),
        config.capacity,
        ring.capacity()
    );

    let start = Instant::now();
    let received = Arc::new(AtomicU64::new(0));

    let mut producers = vec![];
    for producer_id in 0..NUM_PRODUCERS {
        let ring = ring.clone();
        producers.push(
            thread::spawn(move || {
                let start_num = producer_id * MESSAGES_PER_PRODUCER + 1;
                let mut full = 0u64;
                for number in start_num..start_num + MESSAGES_PER_PRODUCER {
                    let mut v = number;
                    while let Err(back) = ring.offer(v) {
                        v = back;
                        full += 1;
                        std::hint::spin_loop();
                    }
                }
                println!("Producer {}: sent {} numbers ({} failed offers)", producer_id, MESSAGES_PER_PRODUCER, full);
            })
        );
    }

    let mut consumers = vec![];
    for _ in 0..NUM_CONSUMERS {
        let ring = ring.clone();
        let received = received.clone();
        consumers.push(
            thread::spawn(move || {
                let mut sum = 0u64;
                while received.load(Ordering::Relaxed) < MAX_NUMBER {
                    if let Some(v) = ring.poll() {
                        sum += v;
                        received.fetch_add(1, Ordering::Relaxed);
                    } else {
                        std::hint::spin_loop();
                    }
                }
                sum
            })
        );
    }

    for p in producers {
        let _ = p.join();
    }
    let sum: u64 = consumers
        .into_iter()
        .map(|c| c.join().unwrap_or(0))
        .sum();
    let duration = start.elapsed();

    let expected_sum = (MAX_NUMBER * (MAX_NUMBER + 1)) / 2;
    println!("\n  Numbers processed:    {}", received.load(Ordering::Relaxed));
    println!("  Sum (calculated):     {}", sum);
    println!("  Sum (expected):       {}", expected_sum);
    println!("  Time taken:           {:.3}s", duration.as_secs_f64());
    println!(
        "  Throughput:           {:.2}M numbers/sec",
        MAX_NUMBER as f64 / duration.as_secs_f64() / 1_000_000.0
    );
    if sum == expected_sum {
        println!("\n  VERIFICATION PASSED");
    } else {
        println!("\n  VERIFICATION FAILED");
    }
    Ok(())
}

//! Stress testing utilities for timed ring buffer runs.

use std::sync::atomic::{ AtomicBool, AtomicU64, Ordering };
use std::sync::Arc;
use std::thread;
use std::time::{ Duration, Instant };

use crossbeam_channel::{ unbounded, Sender };
use lfring::{ AnyRingBuffer, BufferType, RingBuffer };
use rand::Rng;

use crate::verify::{ encode, DataVerifier, SequenceChecker };

/// Values a consumer collects before handing them to the verifier
const VERIFY_BATCH: usize = 256;

/// Configuration for stress tests
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Duration to run the test
    pub duration: Duration,
    /// Number of producer threads
    pub producers: usize,
    /// Number of consumer threads
    pub consumers: usize,
    /// Requested ring capacity, rounded up by the factory
    pub capacity: u64,
    pub variant: BufferType,
    /// One in `jitter` operations yields the thread (0 = never)
    pub jitter: u32,
    /// Print progress every interval
    pub report_interval: Duration,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            producers: 1,
            consumers: 1,
            capacity: 1024,
            variant: BufferType::Classical,
            jitter: 0,
            report_interval: Duration::from_secs(1),
        }
    }
}

impl StressConfig {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            ..Default::default()
        }
    }

    pub fn with_producers(mut self, n: usize) -> Self {
        self.producers = n;
        self
    }

    pub fn with_consumers(mut self, n: usize) -> Self {
        self.consumers = n;
        self
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_variant(mut self, variant: BufferType) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_jitter(mut self, one_in: u32) -> Self {
        self.jitter = one_in;
        self
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }
}

/// Metrics collected during stress testing
#[derive(Debug, Clone, Default)]
pub struct StressMetrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    /// Offers rejected because the ring was full
    pub full_offers: u64,
    /// Polls that came back empty
    pub empty_polls: u64,
    /// Duplicates, foreign values, order violations and lost values
    pub errors: u64,
    pub duration: Duration,
    pub peak_rate: f64,
}

impl StressMetrics {
    pub fn send_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.messages_sent as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn receive_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.messages_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn loss_rate(&self) -> f64 {
        if self.messages_sent > 0 {
            1.0 - (self.messages_received as f64) / (self.messages_sent as f64)
        } else {
            0.0
        }
    }
}

/// Shared counters for stress testing
#[derive(Debug)]
pub struct StressCounters {
    pub sent: AtomicU64,
    pub received: AtomicU64,
    pub full_offers: AtomicU64,
    pub empty_polls: AtomicU64,
    pub errors: AtomicU64,
    pub producers_done: AtomicU64,
    pub running: AtomicBool,
}

impl StressCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_send(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_receive(&self) {
        self.received.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_error(&self, n: u64) {
        self.errors.fetch_add(n, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StressMetrics {
        StressMetrics {
            messages_sent: self.sent.load(Ordering::Relaxed),
            messages_received: self.received.load(Ordering::Relaxed),
            full_offers: self.full_offers.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            duration: Duration::ZERO,
            peak_rate: 0.0,
        }
    }
}

impl Default for StressCounters {
    fn default() -> Self {
        Self {
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
            full_offers: AtomicU64::new(0),
            empty_polls: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            producers_done: AtomicU64::new(0),
            running: AtomicBool::new(true),
        }
    }
}

/// Runner for stress tests with progress reporting
pub struct StressRunner {
    config: StressConfig,
    counters: Arc<StressCounters>,
}

impl StressRunner {
    pub fn new(config: StressConfig) -> Self {
        Self {
            config,
            counters: StressCounters::new(),
        }
    }

    pub fn counters(&self) -> Arc<StressCounters> {
        self.counters.clone()
    }

    pub fn config(&self) -> &StressConfig {
        &self.config
    }

    /// Run `test_fn` while a reporter thread prints progress and stops the
    /// counters once the configured duration has elapsed.
    pub fn run_with_progress<F>(&self, test_fn: F) -> StressMetrics
        where F: FnOnce(Arc<StressCounters>)
    {
        let start = Instant::now();
        let counters = self.counters.clone();
        let duration = self.config.duration;
        let report_interval = self.config.report_interval;

        let report_counters = counters.clone();
        let reporter = thread::spawn(move || {
            let mut last_sent = 0u64;
            let mut peak_rate = 0.0f64;

            while report_counters.is_running() {
                thread::sleep(report_interval);

                let current_sent = report_counters.sent.load(Ordering::Relaxed);
                let current_received = report_counters.received.load(Ordering::Relaxed);
                let full = report_counters.full_offers.load(Ordering::Relaxed);

                let rate = ((current_sent - last_sent) as f64) / report_interval.as_secs_f64();
                peak_rate = peak_rate.max(rate);
                last_sent = current_sent;

                let elapsed = start.elapsed();
                eprintln!(
                    "[{:>5.1}s] sent: {:>10}, recv: {:>10}, rate: {:>10.0}/s, full: {}",
                    elapsed.as_secs_f64(),
                    current_sent,
                    current_received,
                    rate,
                    full
                );

                if elapsed >= duration {
                    report_counters.stop();
                    break;
                }
            }

            peak_rate
        });

        test_fn(counters.clone());

        counters.stop();
        let peak_rate = reporter.join().unwrap_or(0.0);

        let mut metrics = counters.snapshot();
        metrics.duration = start.elapsed();
        metrics.peak_rate = peak_rate;
        metrics
    }

    /// Build the configured ring and hammer it with producers and consumers
    /// until the duration elapses, then drain it and verify delivery.
    ///
    /// Every accepted value must be received exactly once. With a single
    /// consumer each producer's values must also arrive in send order.
    pub fn run(&self) -> lfring::Result<StressMetrics> {
        let ring = Arc::new(lfring::new::<u64>(self.config.variant, self.config.capacity)?);
        let producers = self.config.producers;
        let consumers = self.config.consumers;
        let jitter = self.config.jitter;

        Ok(
            self.run_with_progress(move |counters| {
                let (batch_tx, batch_rx) = unbounded::<Vec<u64>>();

                let verifier = thread::spawn(move || {
                    let mut data = DataVerifier::new(producers as u64);
                    let mut order = (consumers == 1).then(|| SequenceChecker::new(producers));
                    for batch in batch_rx {
                        for value in batch {
                            data.record(value);
                            if let Some(order) = order.as_mut() {
                                order.check(value);
                            }
                        }
                    }
                    let order_errors = order.map_or(0, |o| o.errors());
                    (data, order_errors)
                });

                let producer_handles: Vec<_> = (0..producers)
                    .map(|id| {
                        let ring = ring.clone();
                        let counters = counters.clone();
                        thread::spawn(move || produce(&ring, &counters, id as u64, jitter))
                    })
                    .collect();

                let consumer_handles: Vec<_> = (0..consumers)
                    .map(|_| {
                        let ring = ring.clone();
                        let counters = counters.clone();
                        let batch_tx = batch_tx.clone();
                        thread::spawn(move || consume(&ring, &counters, producers as u64, jitter, batch_tx))
                    })
                    .collect();
                drop(batch_tx);

                let sent_per_producer: Vec<u64> = producer_handles
                    .into_iter()
                    .map(|h| h.join().unwrap_or(0))
                    .collect();
                for h in consumer_handles {
                    if h.join().is_err() {
                        counters.record_error(1);
                    }
                }

                match verifier.join() {
                    Ok((data, order_errors)) => {
                        counters.record_error(data.errors() + order_errors + data.missing(&sent_per_producer));
                    }
                    Err(_) => counters.record_error(1),
                }
            })
        )
    }
}

fn maybe_yield<R: Rng>(rng: &mut R, jitter: u32) {
    if jitter > 0 && rng.gen_ratio(1, jitter) {
        thread::yield_now();
    }
}

/// Offer tagged values until stopped. Returns how many were accepted.
fn produce(ring: &AnyRingBuffer<u64>, counters: &StressCounters, id: u64, jitter: u32) -> u64 {
    let mut rng = rand::thread_rng();
    let mut seq = 0u64;

    while counters.is_running() {
        match ring.offer(encode(id, seq)) {
            Ok(()) => {
                counters.record_send();
                seq += 1;
            }
            Err(_) => {
                counters.full_offers.fetch_add(1, Ordering::Relaxed);
                std::hint::spin_loop();
            }
        }
        maybe_yield(&mut rng, jitter);
    }

    counters.producers_done.fetch_add(1, Ordering::Release);
    seq
}

/// Poll until every producer finished and everything they sent was received.
fn consume(
    ring: &AnyRingBuffer<u64>,
    counters: &StressCounters,
    producers: u64,
    jitter: u32,
    batch_tx: Sender<Vec<u64>>
) {
    let mut rng = rand::thread_rng();
    let mut batch = Vec::with_capacity(VERIFY_BATCH);

    loop {
        match ring.poll() {
            Some(value) => {
                counters.record_receive();
                batch.push(value);
                if batch.len() == VERIFY_BATCH {
                    let full = std::mem::replace(&mut batch, Vec::with_capacity(VERIFY_BATCH));
                    let _ = batch_tx.send(full);
                }
            }
            None => {
                counters.empty_polls.fetch_add(1, Ordering::Relaxed);
                if counters.producers_done.load(Ordering::Acquire) == producers {
                    let sent = counters.sent.load(Ordering::Relaxed);
                    if counters.received.load(Ordering::Acquire) >= sent {
                        break;
                    }
                }
                std::hint::spin_loop();
            }
        }
        maybe_yield(&mut rng, jitter);
    }

    if !batch.is_empty() {
        let _ = batch_tx.send(batch);
    }
}

/// Print a summary of stress test results
pub fn print_summary(label: &str, metrics: &StressMetrics) {
    eprintln!("\n=== {label} ===");
    eprintln!("  Duration:        {:>12.2}s", metrics.duration.as_secs_f64());
    eprintln!("  Messages Sent:   {:>12}", metrics.messages_sent);
    eprintln!("  Messages Recv:   {:>12}", metrics.messages_received);
    eprintln!("  Send Rate:       {:>12.0} msg/s", metrics.send_rate());
    eprintln!("  Receive Rate:    {:>12.0} msg/s", metrics.receive_rate());
    eprintln!("  Peak Rate:       {:>12.0} msg/s", metrics.peak_rate);
    eprintln!("  Full Offers:     {:>12}", metrics.full_offers);
    eprintln!("  Empty Polls:     {:>12}", metrics.empty_polls);
    eprintln!("  Errors:          {:>12}", metrics.errors);

    if metrics.errors > 0 {
        eprintln!("  FAILED: {} errors detected", metrics.errors);
    } else if metrics.loss_rate() > 0.0 {
        eprintln!("  FAILED: {:.4}% message loss", metrics.loss_rate() * 100.0);
    } else {
        eprintln!("  PASSED");
    }
}

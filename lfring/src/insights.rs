//! Insights - Observability for lfring.
//!
//! Zero-cost when disabled. The `offer`/`poll` hot paths never log; only
//! construction and the spinning single-producer/consumer wrappers do.
//!
//! # Usage
//!
//! ```toml
//! lfring = { version = "0.1", features = ["tracing"] }
//! ```
//! ```rust,ignore
//! lfring::init_logging();
//! ```

/// Install a `tracing_subscriber` fmt subscriber honouring `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
#[cfg(feature = "tracing")]
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub fn init_logging() {}

/// Record a buffer construction
#[cfg(feature = "tracing")]
#[inline]
pub fn record_construct(variant: &'static str, requested: u64, capacity: u64) {
    tracing::debug!(variant, requested, capacity, "ring buffer constructed");
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_construct(_variant: &'static str, _requested: u64, _capacity: u64) {}

/// Record that a single-producer/consumer wrapper had to spin
#[cfg(feature = "tracing")]
#[inline]
pub fn record_spin(op: &'static str, spins: u64) {
    if spins > 0 {
        tracing::trace!(op, spins, "spin wrapper retried");
    }
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_spin(_op: &'static str, _spins: u64) {}

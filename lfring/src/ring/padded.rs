//! Cache-line padded counter.

use std::ops::Deref;

use crate::constants::CACHE_LINE_SIZE;
use crate::sync::AtomicU64;

/// Atomic counter on its own 128-byte line (one Apple Silicon line, two x86 lines)
#[repr(align(128))]
pub(crate) struct PaddedAtomicU64(AtomicU64);

const _: () = assert!(std::mem::align_of::<PaddedAtomicU64>() == CACHE_LINE_SIZE);

impl PaddedAtomicU64 {
    pub(crate) fn new(v: u64) -> Self {
        Self(AtomicU64::new(v))
    }
}

impl Deref for PaddedAtomicU64 {
    type Target = AtomicU64;

    #[inline(always)]
    fn deref(&self) -> &AtomicU64 {
        &self.0
    }
}

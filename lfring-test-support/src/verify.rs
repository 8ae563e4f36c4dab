//! Delivery verification for stress runs.
//!
//! Producers tag every value with [`encode`]: the producer id lives in the
//! top bits and a per-producer sequence number in the rest.

use std::collections::HashSet;

const SEQ_BITS: u32 = 40;
const SEQ_MASK: u64 = (1 << SEQ_BITS) - 1;

/// Tag `seq` with the producer that sent it.
#[inline]
pub fn encode(producer: u64, seq: u64) -> u64 {
    debug_assert!(seq <= SEQ_MASK);
    (producer << SEQ_BITS) | seq
}

/// Split a tagged value into `(producer, seq)`.
#[inline]
pub fn decode(value: u64) -> (u64, u64) {
    (value >> SEQ_BITS, value & SEQ_MASK)
}

/// Counts every received value once and flags duplicates and values no
/// producer could have sent.
#[derive(Debug, Default)]
pub struct DataVerifier {
    seen: HashSet<u64>,
    producers: u64,
    duplicates: u64,
    foreign: u64,
}

impl DataVerifier {
    pub fn new(producers: u64) -> Self {
        Self {
            producers,
            ..Default::default()
        }
    }

    /// Returns false for a duplicate or foreign value.
    pub fn record(&mut self, value: u64) -> bool {
        let (producer, _) = decode(value);
        if producer >= self.producers {
            self.foreign += 1;
            return false;
        }
        if !self.seen.insert(value) {
            self.duplicates += 1;
            return false;
        }
        true
    }

    pub fn received(&self) -> u64 {
        self.seen.len() as u64
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn foreign(&self) -> u64 {
        self.foreign
    }

    /// Number of values sent but never received, given how many values each
    /// producer got accepted.
    pub fn missing(&self, sent_per_producer: &[u64]) -> u64 {
        sent_per_producer
            .iter()
            .enumerate()
            .map(|(producer, &sent)| {
                (0..sent).filter(|&seq| !self.seen.contains(&encode(producer as u64, seq))).count() as u64
            })
            .sum()
    }

    pub fn errors(&self) -> u64 {
        self.duplicates + self.foreign
    }
}

/// Checks that one consumer sees each producer's values in send order.
#[derive(Debug)]
pub struct SequenceChecker {
    next: Vec<u64>,
    errors: u64,
}

impl SequenceChecker {
    pub fn new(producers: usize) -> Self {
        Self {
            next: vec![0; producers],
            errors: 0,
        }
    }

    /// Returns false when `value` skips ahead or goes back in its producer's
    /// sequence.
    pub fn check(&mut self, value: u64) -> bool {
        let (producer, seq) = decode(value);
        let Some(next) = self.next.get_mut(producer as usize) else {
            self.errors += 1;
            return false;
        };
        if seq != *next {
            self.errors += 1;
            *next = seq + 1;
            return false;
        }
        *next += 1;
        true
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }
}

//! Probe engine: double-hashing slot sequence.
//!
//! For a hash `h` and capacity `C` the sequence starts at `h mod C` and
//! advances by `P - (h mod P)`, where `P` is the largest value `<= C - 1`
//! that trial division finds no factor for. `P` depends only on the
//! current capacity and is recomputed every time a sequence is built.

/// Largest value in `1..capacity` with no factor in `2..=sqrt(v)`; `3` when
/// the range is empty.
pub(crate) fn largest_prime_below(capacity: usize) -> usize {
    let mut candidate = capacity.saturating_sub(1);
    while candidate >= 1 {
        if is_factorless(candidate) {
            return candidate;
        }
        candidate -= 1;
    }
    3
}

fn is_factorless(n: usize) -> bool {
    let mut d = 2usize;
    while d.saturating_mul(d) <= n {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

#[inline]
pub(crate) fn primary_index(hash: u64, capacity: usize) -> usize {
    debug_assert!(capacity > 0);
    (hash % capacity as u64) as usize
}

#[inline]
pub(crate) fn step_for(hash: u64, capacity: usize) -> usize {
    let prime = largest_prime_below(capacity) as u64;
    (prime - hash % prime) as usize
}

/// Infinite iterator over the slot indices probed for one hash.
#[derive(Debug, Clone)]
pub(crate) struct ProbeSeq {
    index: usize,
    step: usize,
    capacity: usize,
}

impl ProbeSeq {
    pub(crate) fn new(hash: u64, capacity: usize) -> Self {
        Self {
            index: primary_index(hash, capacity),
            step: step_for(hash, capacity),
            capacity,
        }
    }

    /// Current slot; moves the sequence one step forward.
    #[inline]
    pub(crate) fn advance(&mut self) -> usize {
        let current = self.index;
        self.index = (self.index + self.step % self.capacity) % self.capacity;
        current
    }
}

impl Iterator for ProbeSeq {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        Some(self.advance())
    }
}

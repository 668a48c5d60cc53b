//! Per-identity nonce allocation.
//!
//! The [`NonceSequencer`] is the only shared mutable state in the dispatch
//! core. Allocation is a single `fetch_add` on an atomic, so concurrent
//! requests never observe the same value and nobody ever waits on a lock to
//! get a nonce, regardless of how slow the node is being.
//!
//! The counter is seeded once from the node's pending transaction count and
//! never re-queried: the chain's view lags behind what this process has
//! already signed and sent.
//!
//! ## Burned nonces
//!
//! A nonce handed to a submission that was rejected or timed out is
//! "burned". It is never handed out again by [`NonceSequencer::next`]; it is
//! recorded here so operators can see the hole and decide when to
//! [`resync`](NonceSequencer::resync).

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A nonce that was allocated but never landed (as far as we know).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnedNonce {
    /// The burned nonce.
    pub nonce: u64,
    /// Why the submission failed, as reported upstream.
    pub reason: String,
    /// Whether the transaction may still land (timeouts).
    pub possibly_in_flight: bool,
    /// Unix timestamp (milliseconds) when the nonce was burned.
    pub burned_at: u64,
}

/// Lock-free, gap-free nonce allocator for one signing identity.
#[derive(Debug)]
pub struct NonceSequencer {
    next: AtomicU64,
    burned: Mutex<Vec<BurnedNonce>>,
}

impl NonceSequencer {
    /// Creates a sequencer whose first [`next`](Self::next) returns `start`.
    pub fn new(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
            burned: Mutex::new(Vec::new()),
        }
    }

    /// Allocates the next nonce.
    ///
    /// The counter is advanced before the value is returned, so the nonce is
    /// consumed even if the caller never uses it.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Returns the value the next call to [`next`](Self::next) would yield,
    /// without consuming it.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    /// Records `nonce` as burned.
    pub fn mark_burned(&self, nonce: u64, reason: impl Into<String>, possibly_in_flight: bool) {
        let entry = BurnedNonce {
            nonce,
            reason: reason.into(),
            possibly_in_flight,
            burned_at: chrono::Utc::now().timestamp_millis() as u64,
        };
        tracing::warn!(
            nonce,
            reason = %entry.reason,
            possibly_in_flight,
            "nonce burned; on-chain sequence now has a gap"
        );
        self.burned.lock().push(entry);
    }

    /// Returns `true` if any nonce has been burned since the last resync.
    pub fn has_gaps(&self) -> bool {
        !self.burned.lock().is_empty()
    }

    /// Snapshot of the burned nonces, oldest first.
    pub fn burned(&self) -> Vec<BurnedNonce> {
        self.burned.lock().clone()
    }

    /// Resets the counter to the node's observed pending nonce and clears the
    /// burned ledger. Returns the previous counter value and the entries
    /// that were cleared.
    ///
    /// This is the one operation that can move the counter backwards, which
    /// re-issues nonces. Only call it from an explicit operator action, and
    /// only with a value freshly read from the node.
    pub fn resync(&self, observed: u64) -> (u64, Vec<BurnedNonce>) {
        let mut burned = self.burned.lock();
        let previous = self.next.swap(observed, Ordering::SeqCst);
        let cleared = std::mem::take(&mut *burned);
        tracing::info!(
            previous,
            observed,
            cleared = cleared.len(),
            "nonce sequencer resynced"
        );
        (previous, cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn starts_at_seed_and_increments() {
        let seq = NonceSequencer::new(5);
        assert_eq!(seq.peek(), 5);
        assert_eq!(seq.next(), 5);
        assert_eq!(seq.next(), 6);
        assert_eq!(seq.peek(), 7);
    }

    #[test]
    fn peek_does_not_consume() {
        let seq = NonceSequencer::new(0);
        assert_eq!(seq.peek(), 0);
        assert_eq!(seq.peek(), 0);
        assert_eq!(seq.next(), 0);
    }

    #[test]
    fn concurrent_threads_get_contiguous_unique_range() {
        const THREADS: u64 = 16;
        const PER_THREAD: u64 = 500;
        let start = 42;
        let seq = Arc::new(NonceSequencer::new(start));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let seq = Arc::clone(&seq);
                std::thread::spawn(move || (0..PER_THREAD).map(|_| seq.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for nonce in handle.join().unwrap() {
                assert!(seen.insert(nonce), "nonce {nonce} handed out twice");
            }
        }

        let total = THREADS * PER_THREAD;
        assert_eq!(seen.len() as u64, total);
        assert_eq!(*seen.iter().min().unwrap(), start);
        assert_eq!(*seen.iter().max().unwrap(), start + total - 1);
        assert_eq!(seq.peek(), start + total);
    }

    #[test]
    fn burned_nonces_are_recorded_not_reissued() {
        let seq = NonceSequencer::new(10);
        let n = seq.next();
        seq.mark_burned(n, "insufficient funds", false);

        assert!(seq.has_gaps());
        assert_eq!(seq.next(), 11, "burned nonce must not be handed out again");

        let burned = seq.burned();
        assert_eq!(burned.len(), 1);
        assert_eq!(burned[0].nonce, 10);
        assert!(!burned[0].possibly_in_flight);
    }

    #[test]
    fn resync_resets_counter_and_clears_gaps() {
        let seq = NonceSequencer::new(3);
        let n = seq.next();
        seq.mark_burned(n, "timeout", true);
        let _ = seq.next();

        let (previous, cleared) = seq.resync(3);
        assert_eq!(previous, 5);
        assert_eq!(cleared.len(), 1);
        assert_eq!(cleared[0].nonce, 3);
        assert!(!seq.has_gaps());
        assert_eq!(seq.next(), 3);
    }
}

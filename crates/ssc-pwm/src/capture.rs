//! Capture recorder shared between the capture interrupt and control readers.
//!
//! The recorder keeps the last [`CaptureRecord`] behind a seqlock:
//!
//! - **Capture context** (writer): takes the write side with a spinning
//!   compare-and-swap, never sleeps, so it is safe from interrupt-like
//!   callbacks. Concurrent writers serialize on the same word.
//! - **Control thread** (reader): copies both fields and retries if a write
//!   overlapped, so a timestamp is never paired with another capture's id.
//!   Readers never hold up the writer.
//!
//! # Sequence word
//!
//! ```text
//! even ──CAS──▶ odd (write in progress) ──store──▶ even + 2
//! ```

use crossbeam_utils::{Backoff, CachePadded};
use ssc_common::{CaptureRecord, MonotonicClock};
use std::sync::atomic::{fence, AtomicI64, AtomicU64, Ordering};

/// Seqlock-protected last-seen capture record.
pub struct CaptureRecorder {
    /// Sequence number (odd = write in progress).
    sequence: CachePadded<AtomicU64>,
    timestamp: AtomicI64,
    sequence_id: AtomicU64,
}

impl std::fmt::Debug for CaptureRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureRecorder")
            .field("seq", &self.sequence.load(Ordering::Relaxed))
            .field("record", &self.snapshot())
            .finish()
    }
}

impl Default for CaptureRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write side of the seqlock; releases on drop.
struct WriteGuard<'a> {
    sequence: &'a AtomicU64,
    locked: u64,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        // Back to even: write complete
        self.sequence
            .store(self.locked.wrapping_add(1), Ordering::Release);
    }
}

impl CaptureRecorder {
    /// Create a recorder holding [`CaptureRecord::INITIAL`].
    pub fn new() -> Self {
        Self {
            sequence: CachePadded::new(AtomicU64::new(0)),
            timestamp: AtomicI64::new(CaptureRecord::NEVER_CAPTURED),
            sequence_id: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> WriteGuard<'_> {
        let backoff = Backoff::new();
        loop {
            let seq = self.sequence.load(Ordering::Relaxed);
            if seq & 1 == 0
                && self
                    .sequence
                    .compare_exchange_weak(seq, seq + 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                // Odd sequence must be visible before any field store
                fence(Ordering::Release);
                return WriteGuard {
                    sequence: &self.sequence,
                    locked: seq + 1,
                };
            }
            backoff.spin();
        }
    }

    /// Record one capture event.
    ///
    /// **Called by: capture callback**
    ///
    /// Reads `clock` while holding the write side so timestamps and ids
    /// advance together.
    pub fn capture(&self, clock: &dyn MonotonicClock) {
        let _guard = self.lock();
        let now = clock.now_ns();
        self.timestamp.store(now, Ordering::Relaxed);
        let id = self.sequence_id.load(Ordering::Relaxed);
        self.sequence_id.store(id.wrapping_add(1), Ordering::Relaxed);
    }

    /// Consistent copy of the last capture.
    ///
    /// **Called by: control thread**
    ///
    /// Spins only while a capture is being written.
    pub fn snapshot(&self) -> CaptureRecord {
        let backoff = Backoff::new();
        loop {
            let seq1 = self.sequence.load(Ordering::Acquire);

            // If sequence is odd, a write is in progress - spin
            if seq1 & 1 != 0 {
                backoff.snooze();
                continue;
            }

            let record = CaptureRecord {
                timestamp: self.timestamp.load(Ordering::Relaxed),
                sequence_id: self.sequence_id.load(Ordering::Relaxed),
            };

            fence(Ordering::Acquire);
            let seq2 = self.sequence.load(Ordering::Relaxed);
            if seq1 == seq2 {
                return record;
            }

            // Sequence changed during read - retry
            backoff.spin();
        }
    }

    /// Number of completed writes (for diagnostics).
    pub fn write_count(&self) -> u64 {
        self.sequence.load(Ordering::Acquire) / 2
    }
}

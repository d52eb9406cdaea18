//! Last-seen capture record.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

/// Size of the binary record exported to the control surface.
pub const CAPTURE_RECORD_SIZE: usize = 16;

const_assert_eq!(std::mem::size_of::<CaptureRecord>(), CAPTURE_RECORD_SIZE);

/// Timestamp and sequence number of the most recent capture event.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// Monotonic nanoseconds of the last capture, or `-1` before the first one.
    pub timestamp: i64,
    /// Number of captures seen, wrapping at `u64::MAX`.
    pub sequence_id: u64,
}

impl CaptureRecord {
    /// Timestamp value meaning "never captured".
    pub const NEVER_CAPTURED: i64 = -1;

    /// Record state before any capture.
    pub const INITIAL: Self = Self {
        timestamp: Self::NEVER_CAPTURED,
        sequence_id: 0,
    };

    /// True until the first capture lands.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.timestamp == Self::NEVER_CAPTURED && self.sequence_id == 0
    }

    /// Native-endian `{i64 timestamp, u64 id}` blob.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; CAPTURE_RECORD_SIZE] {
        let mut out = [0u8; CAPTURE_RECORD_SIZE];
        out[..8].copy_from_slice(&self.timestamp.to_ne_bytes());
        out[8..].copy_from_slice(&self.sequence_id.to_ne_bytes());
        out
    }

    /// Decode a blob produced by [`CaptureRecord::to_bytes`].
    #[must_use]
    pub fn from_bytes(bytes: &[u8; CAPTURE_RECORD_SIZE]) -> Self {
        let mut ts = [0u8; 8];
        let mut id = [0u8; 8];
        ts.copy_from_slice(&bytes[..8]);
        id.copy_from_slice(&bytes[8..]);
        Self {
            timestamp: i64::from_ne_bytes(ts),
            sequence_id: u64::from_ne_bytes(id),
        }
    }
}

impl Default for CaptureRecord {
    fn default() -> Self {
        Self::INITIAL
    }
}

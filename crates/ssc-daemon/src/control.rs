//! Text and binary control surface.
//!
//! Sysfs-style attributes of the synchronizer:
//!
//! | Attribute   | Access | Format                                         |
//! |-------------|--------|------------------------------------------------|
//! | `enable`    | write  | unsigned decimal; non-zero resynchronizes      |
//! | `record`    | read   | 16 bytes, native endian `{i64 ts, u64 id}`     |
//! | `frequency` | read   | decimal Hz followed by a newline               |

use ssc_common::{SscError, CAPTURE_RECORD_SIZE};
use ssc_pwm::{CaptureRecorder, PwmHal, Synchronizer};
use thiserror::Error;
use tracing::debug;

/// Control surface errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// The written value is not an unsigned decimal.
    #[error("invalid input {0:?}")]
    InvalidInput(String),

    /// The hardware operation behind the attribute failed.
    #[error("I/O error: {0}")]
    Io(#[from] SscError),
}

/// Parse a write to `enable`.
///
/// Surrounding whitespace (such as the newline from `echo`) is ignored.
///
/// # Errors
///
/// Returns [`ControlError::InvalidInput`] for anything but an unsigned
/// decimal that fits in 32 bits.
pub fn parse_enable(input: &str) -> Result<bool, ControlError> {
    input
        .trim()
        .parse::<u32>()
        .map(|value| value != 0)
        .map_err(|_| ControlError::InvalidInput(input.to_string()))
}

/// Handle a write to `enable`, returning the number of bytes consumed.
///
/// Zero is accepted and does nothing.
///
/// # Errors
///
/// [`ControlError::InvalidInput`] for unparseable input, or
/// [`ControlError::Io`] if resynchronization fails.
pub fn store_enable<H: PwmHal>(
    sync: &mut Synchronizer<H>,
    input: &str,
) -> Result<usize, ControlError> {
    if parse_enable(input)? {
        sync.enable()?;
    } else {
        debug!("enable written with 0, ignoring");
    }
    Ok(input.len())
}

/// Read `record`.
pub fn show_record(recorder: &CaptureRecorder) -> [u8; CAPTURE_RECORD_SIZE] {
    recorder.snapshot().to_bytes()
}

/// Read `frequency`.
pub fn show_frequency<H: PwmHal>(sync: &Synchronizer<H>) -> String {
    format!("{}\n", sync.frequency())
}

//! PWM plane for the SSC signal generator.
//!
//! This crate provides:
//! - [`PwmHal`] trait abstracting the PWM controller
//! - [`simulated`] module with an in-memory controller for tests and demos
//! - [`capture`] module with the seqlock-protected capture recorder
//! - [`synchronizer`] module owning the clock, sync and stamp channels

pub mod capture;
pub mod simulated;
pub mod synchronizer;

pub use capture::*;
pub use simulated::*;
pub use synchronizer::*;

use ssc_common::{Polarity, SscResult};

/// Exclusive claim on one hardware PWM channel.
///
/// Handles are deliberately not `Clone`: [`PwmHal::free`] consumes the
/// handle, so a channel can be given back at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct PwmHandle {
    channel: u32,
}

impl PwmHandle {
    /// Wrap a channel number. Only controller implementations should call this.
    #[must_use]
    pub fn new(channel: u32) -> Self {
        Self { channel }
    }

    /// Hardware channel number.
    #[must_use]
    pub fn channel(&self) -> u32 {
        self.channel
    }
}

/// Callback run by the controller on every capture edge.
///
/// Runs in interrupt-like context: it must not block, allocate, or call
/// back into the controller.
pub type CaptureCallback = Box<dyn Fn() + Send + Sync>;

/// PWM controller abstraction.
///
/// This trait defines the interface the synchronizer needs from the
/// hardware, allowing it to run against a real controller or the
/// [`SimulatedPwm`] through a common interface.
pub trait PwmHal: Send {
    /// Request exclusive ownership of `channel`.
    ///
    /// `label` identifies the consumer in controller diagnostics.
    fn request(&mut self, channel: u32, label: &str) -> SscResult<PwmHandle>;

    /// Apply period and duty time in a single call.
    fn configure(&mut self, pwm: &PwmHandle, period_ns: u32, duty_ns: u32) -> SscResult<()>;

    /// Set the output polarity.
    fn set_polarity(&mut self, pwm: &PwmHandle, polarity: Polarity) -> SscResult<()>;

    /// Issue an alignment pulse restarting `pwm` and every channel chained to it.
    ///
    /// Bounded in time; never waits on external events.
    fn sync(&mut self, pwm: &PwmHandle) -> SscResult<()>;

    /// Run `callback` whenever the configured capture edge occurs on `pwm`.
    fn arm_capture(&mut self, pwm: &PwmHandle, callback: CaptureCallback) -> SscResult<()>;

    /// Give the channel back, disarming any capture on it.
    fn free(&mut self, pwm: PwmHandle);
}

//! Clock/sync/stamp channel synchronizer.
//!
//! Owns the three PWM channels feeding the SSC peripheral, keeps the clock
//! and sync outputs phase aligned, and records capture timestamps from the
//! stamp channel.
//!
//! # Lifecycle
//!
//! ```text
//! build ──▶ acquire clock ──▶ acquire sync ──▶ acquire stamp ──▶ arm capture
//!   │            any failure: free what was acquired, newest first
//!   ▼
//! enable (repeatable) ──▶ release (stamp, sync, clock; idempotent)
//! ```

use crate::capture::CaptureRecorder;
use crate::{PwmHal, PwmHandle};
use ssc_common::{
    CaptureRecord, ChannelConfig, MonotonicClock, SignalRole, SignalSet, SscError, SscResult,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// A requested and fully configured PWM channel.
#[derive(Debug)]
pub struct PwmChannel {
    role: SignalRole,
    handle: PwmHandle,
    config: ChannelConfig,
}

impl PwmChannel {
    /// Role this channel plays.
    pub fn role(&self) -> SignalRole {
        self.role
    }

    /// Hardware channel number.
    pub fn channel(&self) -> u32 {
        self.handle.channel()
    }

    /// Waveform applied to the channel.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

/// Request `config.channel` and apply its waveform and polarity.
///
/// A channel whose configuration fails is freed before returning, so the
/// caller never sees a half-configured channel.
///
/// # Errors
///
/// - [`SscError::ChannelUnavailable`] if the channel is owned or out of range.
/// - [`SscError::ConfigurationFailed`] if the waveform is invalid or the
///   hardware rejects period, duty, or polarity.
pub fn acquire<H: PwmHal + ?Sized>(
    hal: &mut H,
    role: SignalRole,
    config: &ChannelConfig,
) -> SscResult<PwmChannel> {
    let channel = config.channel;

    if let Err(e) = config.validate() {
        error!(%role, channel, error = %e, "Rejected PWM{} parameters", channel);
        return Err(e);
    }

    let handle = hal.request(channel, role.label()).map_err(|e| {
        error!(%role, channel, error = %e, "could not request PWM{}", channel);
        match e {
            SscError::ChannelUnavailable { .. } => e,
            other => SscError::ChannelUnavailable {
                channel,
                reason: other.to_string(),
            },
        }
    })?;

    if let Err(e) = hal.configure(&handle, config.period_ns, config.duty_ns) {
        error!(%role, channel, error = %e, "could not config PWM{}", channel);
        hal.free(handle);
        return Err(configuration_failed(channel, e));
    }

    if let Err(e) = hal.set_polarity(&handle, config.polarity) {
        error!(%role, channel, error = %e, "could not set PWM{} polarity", channel);
        hal.free(handle);
        return Err(configuration_failed(channel, e));
    }

    info!(
        %role,
        channel,
        period_ns = config.period_ns,
        duty_ns = config.duty_ns,
        polarity = %config.polarity,
        "{}: chan={}, period={}, duty={}",
        role.label(),
        channel,
        config.period_ns,
        config.duty_ns
    );

    Ok(PwmChannel {
        role,
        handle,
        config: *config,
    })
}

fn configuration_failed(channel: u32, e: SscError) -> SscError {
    match e {
        SscError::ConfigurationFailed { .. } => e,
        other => SscError::ConfigurationFailed {
            channel,
            reason: other.to_string(),
        },
    }
}

/// Owner of the clock, sync and stamp channels.
///
/// Built all-or-nothing by [`Synchronizer::build`]; channels are given back
/// by [`Synchronizer::release`] or on drop.
pub struct Synchronizer<H: PwmHal> {
    hal: H,
    clock: Option<PwmChannel>,
    sync: Option<PwmChannel>,
    stamp: Option<PwmChannel>,
    signals: SignalSet,
    recorder: Arc<CaptureRecorder>,
    time_source: Arc<dyn MonotonicClock>,
    enable_count: u64,
}

impl<H: PwmHal> std::fmt::Debug for Synchronizer<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("clock", &self.clock)
            .field("sync", &self.sync)
            .field("stamp", &self.stamp)
            .field("recorder", &self.recorder)
            .field("enable_count", &self.enable_count)
            .finish_non_exhaustive()
    }
}

impl<H: PwmHal> Synchronizer<H> {
    /// Acquire the clock, sync and stamp channels in that order and arm
    /// capture on the stamp channel.
    ///
    /// Capture is armed only after all three channels exist. On any failure
    /// every channel acquired so far is freed, newest first, and the error is
    /// returned; no partially built synchronizer escapes.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`acquire`], or
    /// [`SscError::CaptureFailed`] if the stamp channel cannot be armed.
    pub fn build(
        hal: H,
        signals: &SignalSet,
        time_source: Arc<dyn MonotonicClock>,
    ) -> SscResult<Self> {
        let mut this = Self {
            hal,
            clock: None,
            sync: None,
            stamp: None,
            signals: *signals,
            recorder: Arc::new(CaptureRecorder::new()),
            time_source,
            enable_count: 0,
        };

        if let Err(e) = this.acquire_all() {
            error!(error = %e, "Synchronizer construction failed, releasing channels");
            this.release();
            return Err(e);
        }

        info!(
            frequency_hz = this.frequency(),
            "PWM synchronizer ready"
        );
        Ok(this)
    }

    fn acquire_all(&mut self) -> SscResult<()> {
        for role in SignalRole::ALL {
            let channel = acquire(&mut self.hal, role, self.signals.get(role))?;
            *self.slot_mut(role) = Some(channel);
        }

        let stamp = self.stamp.as_ref().ok_or(SscError::Released)?;
        let recorder = Arc::clone(&self.recorder);
        let time_source = Arc::clone(&self.time_source);
        self.hal
            .arm_capture(
                &stamp.handle,
                Box::new(move || recorder.capture(time_source.as_ref())),
            )
            .map_err(|e| {
                let channel = stamp.channel();
                error!(channel, error = %e, "could not arm capture on PWM{}", channel);
                match e {
                    SscError::CaptureFailed { .. } => e,
                    other => SscError::CaptureFailed {
                        channel,
                        reason: other.to_string(),
                    },
                }
            })?;
        debug!(channel = stamp.channel(), "Capture armed");
        Ok(())
    }

    fn slot_mut(&mut self, role: SignalRole) -> &mut Option<PwmChannel> {
        match role {
            SignalRole::Clock => &mut self.clock,
            SignalRole::Sync => &mut self.sync,
            SignalRole::Stamp => &mut self.stamp,
        }
    }

    /// Re-trigger the alignment pulse on the clock channel and everything
    /// chained to it.
    ///
    /// Safe to call repeatedly; channel configuration is untouched and the
    /// capture record is not modified. No automatic retry.
    ///
    /// # Errors
    ///
    /// - [`SscError::SyncFailed`] if the hardware reports a failed pulse.
    /// - [`SscError::Released`] after [`Synchronizer::release`].
    pub fn enable(&mut self) -> SscResult<()> {
        let clock = self.clock.as_ref().ok_or(SscError::Released)?;

        self.hal.sync(&clock.handle).map_err(|e| {
            error!(error = %e, "could not sync PWM channels");
            match e {
                SscError::SyncFailed(_) => e,
                other => SscError::SyncFailed(other.to_string()),
            }
        })?;

        self.enable_count += 1;
        debug!(enables = self.enable_count, "PWM channels synchronized");
        Ok(())
    }

    /// Consistent copy of the last capture.
    pub fn read_record(&self) -> CaptureRecord {
        self.recorder.snapshot()
    }

    /// Shared handle to the capture recorder, for readers on other threads.
    pub fn recorder(&self) -> Arc<CaptureRecorder> {
        Arc::clone(&self.recorder)
    }

    /// Generated clock frequency in Hz (`1e9 / clock period`, truncated).
    pub fn frequency(&self) -> u32 {
        self.signals.clock.frequency_hz()
    }

    /// Channel parameters the synchronizer was built with.
    pub fn signals(&self) -> &SignalSet {
        &self.signals
    }

    /// The channel currently held for `role`, if not yet released.
    pub fn channel(&self, role: SignalRole) -> Option<&PwmChannel> {
        match role {
            SignalRole::Clock => self.clock.as_ref(),
            SignalRole::Sync => self.sync.as_ref(),
            SignalRole::Stamp => self.stamp.as_ref(),
        }
    }

    /// Successful `enable()` calls so far.
    pub fn enable_count(&self) -> u64 {
        self.enable_count
    }

    /// Whether every channel has been given back.
    pub fn is_released(&self) -> bool {
        self.clock.is_none() && self.sync.is_none() && self.stamp.is_none()
    }

    /// The underlying controller.
    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// Free the stamp, sync and clock channels, in that order.
    ///
    /// Channels already freed are skipped, so calling this again is a no-op.
    pub fn release(&mut self) {
        for role in SignalRole::ALL.iter().rev() {
            if let Some(channel) = self.slot_mut(*role).take() {
                debug!(role = %channel.role, channel = channel.channel(), "Releasing PWM channel");
                self.hal.free(channel.handle);
            }
        }
    }
}

impl<H: PwmHal> Drop for Synchronizer<H> {
    fn drop(&mut self) {
        self.release();
    }
}

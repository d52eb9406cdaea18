//! Simulated PWM controller.
//!
//! Keeps channel ownership and waveform settings in memory and lets tests
//! inject failures per operation and channel. Clones share state, so a test
//! can hand one clone to the synchronizer and inspect the controller through
//! another, and a background thread can fire capture edges.

use crate::{CaptureCallback, PwmHal, PwmHandle};
use ssc_common::{Polarity, SimulationConfig, SscError, SscResult};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

/// Controller operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    /// [`PwmHal::request`].
    Request,
    /// [`PwmHal::configure`].
    Configure,
    /// [`PwmHal::set_polarity`].
    Polarity,
    /// [`PwmHal::sync`].
    Sync,
    /// [`PwmHal::arm_capture`].
    ArmCapture,
}

/// Observable state of an owned channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimChannelState {
    /// Label passed to `request`.
    pub label: String,
    /// Period and duty time, once configured.
    pub waveform: Option<(u32, u32)>,
    /// Output polarity.
    pub polarity: Polarity,
    /// Whether a capture callback is armed.
    pub capture_armed: bool,
}

struct SimChannel {
    label: String,
    waveform: Option<(u32, u32)>,
    polarity: Polarity,
    capture: Option<Arc<CaptureCallback>>,
}

#[derive(Default)]
struct SimState {
    channel_count: u32,
    owned: BTreeMap<u32, SimChannel>,
    failing: HashSet<(SimOp, u32)>,
    sync_failures_left: u32,
    sync_pulses: u64,
    captures_fired: u64,
    release_log: Vec<u32>,
    double_releases: u64,
}

/// In-memory PWM controller.
#[derive(Clone)]
pub struct SimulatedPwm {
    state: Arc<Mutex<SimState>>,
}

impl std::fmt::Debug for SimulatedPwm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("SimulatedPwm")
            .field("channel_count", &state.channel_count)
            .field("owned", &state.owned.keys().collect::<Vec<_>>())
            .field("sync_pulses", &state.sync_pulses)
            .finish_non_exhaustive()
    }
}

impl SimulatedPwm {
    /// Create a controller exposing channels `0..channel_count`.
    pub fn new(channel_count: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                channel_count,
                ..SimState::default()
            })),
        }
    }

    /// Create a controller from the `[simulation]` configuration section.
    pub fn from_config(config: &SimulationConfig) -> Self {
        let sim = Self::new(config.channel_count);
        sim.fail_next_syncs(config.sync_failures);
        sim
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `op` fail on `channel` until [`SimulatedPwm::clear_failures`].
    pub fn fail_on(&self, op: SimOp, channel: u32) {
        self.state().failing.insert((op, channel));
    }

    /// Make the next `count` alignment pulses fail on any channel.
    pub fn fail_next_syncs(&self, count: u32) {
        self.state().sync_failures_left = count;
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing.clear();
        state.sync_failures_left = 0;
    }

    /// Channels currently owned, ascending.
    pub fn owned_channels(&self) -> Vec<u32> {
        self.state().owned.keys().copied().collect()
    }

    /// Whether `channel` is currently owned.
    pub fn is_owned(&self, channel: u32) -> bool {
        self.state().owned.contains_key(&channel)
    }

    /// State of an owned channel.
    pub fn channel_state(&self, channel: u32) -> Option<SimChannelState> {
        self.state().owned.get(&channel).map(|ch| SimChannelState {
            label: ch.label.clone(),
            waveform: ch.waveform,
            polarity: ch.polarity,
            capture_armed: ch.capture.is_some(),
        })
    }

    /// Channels in the order they were freed.
    pub fn release_log(&self) -> Vec<u32> {
        self.state().release_log.clone()
    }

    /// Frees of channels that were not owned at the time.
    pub fn double_releases(&self) -> u64 {
        self.state().double_releases
    }

    /// Successful alignment pulses.
    pub fn sync_pulses(&self) -> u64 {
        self.state().sync_pulses
    }

    /// Capture callbacks actually run.
    pub fn captures_fired(&self) -> u64 {
        self.state().captures_fired
    }

    /// Simulate a capture edge on `channel`.
    ///
    /// Returns `false` if no callback is armed there. The callback runs
    /// without the controller lock held, as an interrupt handler would.
    pub fn fire_capture(&self, channel: u32) -> bool {
        let callback = {
            let mut state = self.state();
            let callback = state
                .owned
                .get(&channel)
                .and_then(|ch| ch.capture.as_ref().map(Arc::clone));
            if callback.is_some() {
                state.captures_fired += 1;
            }
            callback
        };

        match callback {
            Some(callback) => {
                (*callback)();
                true
            }
            None => false,
        }
    }

    fn check_injected(state: &SimState, op: SimOp, channel: u32) -> Result<(), String> {
        if state.failing.contains(&(op, channel)) {
            Err(format!("injected {op:?} failure"))
        } else {
            Ok(())
        }
    }
}

impl PwmHal for SimulatedPwm {
    fn request(&mut self, channel: u32, label: &str) -> SscResult<PwmHandle> {
        let mut state = self.state();
        let unavailable = |reason: String| SscError::ChannelUnavailable { channel, reason };

        if channel >= state.channel_count {
            return Err(unavailable(format!(
                "controller has {} channels",
                state.channel_count
            )));
        }
        if let Some(owner) = state.owned.get(&channel) {
            return Err(unavailable(format!("already requested by {}", owner.label)));
        }
        Self::check_injected(&state, SimOp::Request, channel).map_err(unavailable)?;

        state.owned.insert(
            channel,
            SimChannel {
                label: label.to_string(),
                waveform: None,
                polarity: Polarity::Normal,
                capture: None,
            },
        );
        debug!(channel, label, "Simulated PWM channel requested");
        Ok(PwmHandle::new(channel))
    }

    fn configure(&mut self, pwm: &PwmHandle, period_ns: u32, duty_ns: u32) -> SscResult<()> {
        let channel = pwm.channel();
        let mut state = self.state();
        let failed = |reason: String| SscError::ConfigurationFailed { channel, reason };

        Self::check_injected(&state, SimOp::Configure, channel).map_err(failed)?;
        if period_ns == 0 || duty_ns > period_ns {
            return Err(failed(format!(
                "invalid waveform period={period_ns} duty={duty_ns}"
            )));
        }
        let ch = state
            .owned
            .get_mut(&channel)
            .ok_or_else(|| failed("channel not requested".into()))?;
        ch.waveform = Some((period_ns, duty_ns));
        Ok(())
    }

    fn set_polarity(&mut self, pwm: &PwmHandle, polarity: Polarity) -> SscResult<()> {
        let channel = pwm.channel();
        let mut state = self.state();
        let failed = |reason: String| SscError::ConfigurationFailed { channel, reason };

        Self::check_injected(&state, SimOp::Polarity, channel).map_err(failed)?;
        let ch = state
            .owned
            .get_mut(&channel)
            .ok_or_else(|| failed("channel not requested".into()))?;
        ch.polarity = polarity;
        Ok(())
    }

    fn sync(&mut self, pwm: &PwmHandle) -> SscResult<()> {
        let channel = pwm.channel();
        let mut state = self.state();

        if !state.owned.contains_key(&channel) {
            return Err(SscError::SyncFailed(format!("PWM{channel} not requested")));
        }
        if state.sync_failures_left > 0 {
            state.sync_failures_left -= 1;
            return Err(SscError::SyncFailed(format!(
                "PWM{channel} alignment pulse timed out"
            )));
        }
        Self::check_injected(&state, SimOp::Sync, channel).map_err(SscError::SyncFailed)?;

        state.sync_pulses += 1;
        trace!(channel, pulses = state.sync_pulses, "Simulated alignment pulse");
        Ok(())
    }

    fn arm_capture(&mut self, pwm: &PwmHandle, callback: CaptureCallback) -> SscResult<()> {
        let channel = pwm.channel();
        let mut state = self.state();
        let failed = |reason: String| SscError::CaptureFailed { channel, reason };

        Self::check_injected(&state, SimOp::ArmCapture, channel).map_err(failed)?;
        let ch = state
            .owned
            .get_mut(&channel)
            .ok_or_else(|| failed("channel not requested".into()))?;
        ch.capture = Some(Arc::new(callback));
        Ok(())
    }

    fn free(&mut self, pwm: PwmHandle) {
        let channel = pwm.channel();
        let mut state = self.state();

        if state.owned.remove(&channel).is_some() {
            state.release_log.push(channel);
            debug!(channel, "Simulated PWM channel freed");
        } else {
            state.double_releases += 1;
            warn!(channel, "Free of PWM channel that is not owned");
        }
    }
}

//! Common utilities for integration tests.

#![allow(dead_code)] // Not every helper is used by every test module

use ssc_common::{ChannelConfig, ManualClock, MonotonicClock, Polarity, SignalSet};
use ssc_pwm::{SimulatedPwm, Synchronizer};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Number of channels on the simulated controller.
pub const CHANNELS: u32 = 4;

/// 24 kHz bit clock, 375 Hz frame sync and stamp, sync inverted.
pub fn signals() -> SignalSet {
    SignalSet {
        clock: ChannelConfig::new(0, 41_667, 20_833),
        sync: ChannelConfig::new(1, 2_666_688, 41_667).with_polarity(Polarity::Inversed),
        stamp: ChannelConfig::new(2, 2_666_688, 41_667),
    }
}

/// Signals with the given clock period and everything else default.
pub fn signals_with_clock_period(period_ns: u32) -> SignalSet {
    SignalSet {
        clock: ChannelConfig::new(0, period_ns, period_ns / 2),
        ..signals()
    }
}

/// A simulated controller plus a clone for inspecting it afterwards.
pub fn controller() -> (SimulatedPwm, SimulatedPwm) {
    let sim = SimulatedPwm::new(CHANNELS);
    let observer = sim.clone();
    (sim, observer)
}

/// Build a synchronizer on `sim` driven by `clock`.
pub fn build(
    sim: SimulatedPwm,
    clock: Arc<dyn MonotonicClock>,
) -> Synchronizer<SimulatedPwm> {
    Synchronizer::build(sim, &signals(), clock).expect("synchronizer should build")
}

/// Build a synchronizer on `sim` with a manual clock starting at `start_ns`.
pub fn build_manual(sim: SimulatedPwm, start_ns: i64) -> (Synchronizer<SimulatedPwm>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_ns));
    let sync = build(sim, Arc::clone(&clock) as Arc<dyn MonotonicClock>);
    (sync, clock)
}

/// Clock that returns 0, 1, 2, ... on successive reads.
///
/// Each capture reads the clock exactly once while holding the record, so a
/// consistent record always has `timestamp == sequence_id - 1`.
#[derive(Debug, Default)]
pub struct TickClock {
    next: AtomicI64,
}

impl MonotonicClock for TickClock {
    fn now_ns(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

//! Teardown and frequency acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - Release frees stamp, sync, clock exactly once each
//! - Releasing twice, or dropping after release, frees nothing more
//! - Capture edges after release are not delivered
//! - Frequency is `1e9 / clock period` truncated

use super::common::{controller, signals_with_clock_period, CHANNELS};
use ssc_common::{ManualClock, SscError};
use ssc_pwm::{SimulatedPwm, Synchronizer};
use std::sync::Arc;

#[test]
fn test_release_order_and_idempotence() {
    let (sim, observer) = controller();
    let mut sync = Synchronizer::build(
        sim,
        &signals_with_clock_period(41_667),
        Arc::new(ManualClock::new(0)),
    )
    .unwrap();

    sync.release();
    assert!(sync.is_released());
    assert_eq!(observer.release_log(), vec![2, 1, 0]);

    sync.release();
    drop(sync);
    assert_eq!(observer.release_log(), vec![2, 1, 0]);
    assert_eq!(observer.double_releases(), 0);
    assert!(observer.owned_channels().is_empty());
}

#[test]
fn test_drop_releases_channels() {
    let (sim, observer) = controller();
    {
        let _sync = Synchronizer::build(
            sim,
            &signals_with_clock_period(41_667),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        assert_eq!(observer.owned_channels().len(), 3);
    }
    assert_eq!(observer.release_log(), vec![2, 1, 0]);
}

#[test]
fn test_no_capture_after_release() {
    let (sim, irq) = controller();
    let mut sync = Synchronizer::build(
        sim,
        &signals_with_clock_period(41_667),
        Arc::new(ManualClock::new(10)),
    )
    .unwrap();
    irq.fire_capture(2);
    let recorder = sync.recorder();

    sync.release();
    assert!(!irq.fire_capture(2));
    assert_eq!(recorder.snapshot().sequence_id, 1);
    assert_eq!(sync.enable(), Err(SscError::Released));
}

#[test]
fn test_channels_reusable_after_release() {
    let sim = SimulatedPwm::new(CHANNELS);
    let mut first = Synchronizer::build(
        sim.clone(),
        &signals_with_clock_period(41_667),
        Arc::new(ManualClock::new(0)),
    )
    .unwrap();
    first.release();

    let second = Synchronizer::build(
        sim.clone(),
        &signals_with_clock_period(41_667),
        Arc::new(ManualClock::new(0)),
    );
    assert!(second.is_ok());
    assert_eq!(sim.owned_channels(), vec![0, 1, 2]);
}

#[test]
fn test_frequency() {
    for (period_ns, expected_hz) in [(41_667, 23_999), (1_000_000, 1_000), (1, 1_000_000_000)] {
        let (sim, _observer) = controller();
        let sync = Synchronizer::build(
            sim,
            &signals_with_clock_period(period_ns),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        assert_eq!(sync.frequency(), expected_hz, "period {period_ns}");
    }
}

#[test]
fn test_frequency_survives_release() {
    let (sim, _observer) = controller();
    let mut sync = Synchronizer::build(
        sim,
        &signals_with_clock_period(1_000_000),
        Arc::new(ManualClock::new(0)),
    )
    .unwrap();
    sync.release();
    assert_eq!(sync.frequency(), 1_000);
}

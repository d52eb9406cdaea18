//! Construction acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - A failed build leaves no channel owned
//! - Channels are released newest first
//! - Invalid parameters are rejected before the channel is requested

use super::common::{controller, signals, CHANNELS};
use ssc_common::{ChannelConfig, ManualClock, SignalRole, SscError};
use ssc_pwm::{SimOp, SimulatedPwm, Synchronizer};
use std::sync::Arc;

fn try_build(sim: SimulatedPwm) -> Result<Synchronizer<SimulatedPwm>, SscError> {
    Synchronizer::build(sim, &signals(), Arc::new(ManualClock::new(0)))
}

#[test]
fn test_build_owns_three_channels() {
    let (sim, observer) = controller();
    let sync = try_build(sim).unwrap();

    assert_eq!(observer.owned_channels(), vec![0, 1, 2]);
    for role in SignalRole::ALL {
        let state = observer
            .channel_state(signals().get(role).channel)
            .unwrap();
        assert_eq!(state.label, role.label());
        assert_eq!(state.capture_armed, role == SignalRole::Stamp);
    }
    assert_eq!(
        observer.channel_state(0).unwrap().waveform,
        Some((41_667, 20_833))
    );
    assert!(!sync.is_released());
}

#[test]
fn test_failure_at_every_step_leaves_nothing_owned() {
    let steps = [SimOp::Request, SimOp::Configure, SimOp::Polarity];

    for role in SignalRole::ALL {
        let channel = signals().get(role).channel;
        for op in steps {
            let (sim, observer) = controller();
            sim.fail_on(op, channel);

            let err = try_build(sim).unwrap_err();
            assert_eq!(err.channel(), Some(channel), "{role} {op:?}");
            match op {
                SimOp::Request => {
                    assert!(matches!(err, SscError::ChannelUnavailable { .. }), "{err}");
                }
                _ => {
                    assert!(matches!(err, SscError::ConfigurationFailed { .. }), "{err}");
                }
            }
            assert!(observer.owned_channels().is_empty(), "{role} {op:?}");
            assert_eq!(observer.double_releases(), 0);
        }
    }
}

#[test]
fn test_capture_arming_failure_rolls_back() {
    let (sim, observer) = controller();
    sim.fail_on(SimOp::ArmCapture, 2);

    let err = try_build(sim).unwrap_err();
    assert!(matches!(err, SscError::CaptureFailed { channel: 2, .. }));
    assert!(observer.owned_channels().is_empty());
    assert_eq!(observer.release_log(), vec![2, 1, 0]);
}

#[test]
fn test_rollback_order_is_newest_first() {
    let (sim, observer) = controller();
    sim.fail_on(SimOp::Request, 2);
    try_build(sim).unwrap_err();
    assert_eq!(observer.release_log(), vec![1, 0]);

    let (sim, observer) = controller();
    sim.fail_on(SimOp::Configure, 2);
    try_build(sim).unwrap_err();
    assert_eq!(observer.release_log(), vec![2, 1, 0]);

    let (sim, observer) = controller();
    sim.fail_on(SimOp::Request, 0);
    try_build(sim).unwrap_err();
    assert!(observer.release_log().is_empty());
}

#[test]
fn test_busy_channel_is_unavailable() {
    let (sim, observer) = controller();
    let _first = try_build(sim.clone()).unwrap();

    let err = try_build(sim).unwrap_err();
    assert!(matches!(err, SscError::ChannelUnavailable { channel: 0, .. }));
    assert_eq!(observer.owned_channels(), vec![0, 1, 2]);
}

#[test]
fn test_invalid_waveform_rolls_back_earlier_channels() {
    let (sim, observer) = controller();
    let mut bad = signals();
    bad.sync = ChannelConfig::new(1, 1_000, 2_000);

    let err = Synchronizer::build(sim, &bad, Arc::new(ManualClock::new(0))).unwrap_err();
    assert!(matches!(err, SscError::ConfigurationFailed { channel: 1, .. }));
    assert!(observer.owned_channels().is_empty());
    assert_eq!(observer.release_log(), vec![0]);
}

#[test]
fn test_out_of_range_channel_is_unavailable() {
    let (sim, observer) = controller();
    let mut bad = signals();
    bad.stamp = ChannelConfig::new(CHANNELS, 2_666_688, 41_667);

    let err = Synchronizer::build(sim, &bad, Arc::new(ManualClock::new(0))).unwrap_err();
    assert!(matches!(err, SscError::ChannelUnavailable { .. }));
    assert!(observer.owned_channels().is_empty());
}

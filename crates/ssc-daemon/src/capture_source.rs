//! Simulated capture interrupt source.
//!
//! Fires the stamp channel of a [`SimulatedPwm`] once per stamp period from
//! a dedicated thread, standing in for the hardware capture interrupt.

use ssc_pwm::SimulatedPwm;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct EdgeState {
    stop_requested: AtomicBool,
    edges: AtomicU64,
    missed: AtomicU64,
}

/// Background thread generating capture edges.
#[derive(Debug)]
pub struct CaptureSource {
    state: Arc<EdgeState>,
    handle: Option<JoinHandle<()>>,
    channel: u32,
    period: Duration,
}

impl CaptureSource {
    /// Start firing `channel` every `period`.
    ///
    /// The period is clamped to at least 1ms so a very fast stamp signal
    /// does not turn into a busy loop.
    pub fn start(pwm: SimulatedPwm, channel: u32, period: Duration) -> std::io::Result<Self> {
        let period = period.max(Duration::from_millis(1));
        let state = Arc::new(EdgeState::default());
        let thread_state = Arc::clone(&state);

        info!(channel, period_us = period.as_micros(), "Starting capture source");

        let handle = thread::Builder::new()
            .name("ssc-capture".into())
            .spawn(move || {
                debug!("Capture source thread started");
                while !thread_state.stop_requested.load(Ordering::Acquire) {
                    thread::sleep(period);
                    if thread_state.stop_requested.load(Ordering::Acquire) {
                        break;
                    }
                    if pwm.fire_capture(channel) {
                        thread_state.edges.fetch_add(1, Ordering::Relaxed);
                    } else {
                        thread_state.missed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                debug!("Capture source thread stopped");
            })?;

        Ok(Self {
            state,
            handle: Some(handle),
            channel,
            period,
        })
    }

    /// Edges delivered to an armed callback.
    pub fn edges(&self) -> u64 {
        self.state.edges.load(Ordering::Relaxed)
    }

    /// Edges that found no armed callback (channel released).
    pub fn missed(&self) -> u64 {
        self.state.missed.load(Ordering::Relaxed)
    }

    /// Interval between edges.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.state.stop_requested.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.join() {
                warn!(channel = self.channel, "Capture source thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Signal roles and per-channel PWM parameters.
//!
//! The SSC peripheral is fed by three PWM outputs: a bit clock, a frame sync
//! and a stamp signal whose edges are captured. Each role carries one
//! [`ChannelConfig`] describing the waveform.

use crate::error::{SscError, SscResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nanoseconds in one second.
pub const NSEC_PER_SEC: u32 = 1_000_000_000;

/// Logical role of a PWM channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalRole {
    /// Bit clock; its period defines the generated frequency.
    Clock,
    /// Frame sync, phase-aligned with the clock on enable.
    Sync,
    /// Capture-capable channel whose edges are timestamped.
    Stamp,
}

impl SignalRole {
    /// Acquisition order. Teardown walks it backwards.
    pub const ALL: [SignalRole; 3] = [Self::Clock, Self::Sync, Self::Stamp];

    /// Label handed to the hardware layer when requesting the channel.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Clock => "ssc,clk-pwm",
            Self::Sync => "ssc,sync-pwm",
            Self::Stamp => "ssc,stamp-pwm",
        }
    }
}

impl fmt::Display for SignalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clock => write!(f, "clock"),
            Self::Sync => write!(f, "sync"),
            Self::Stamp => write!(f, "stamp"),
        }
    }
}

/// Output polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Active high.
    #[default]
    Normal,
    /// Active low.
    Inversed,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Inversed => write!(f, "inversed"),
        }
    }
}

/// Waveform parameters for one hardware PWM channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Hardware channel number.
    pub channel: u32,
    /// Period in nanoseconds. Must be non-zero.
    pub period_ns: u32,
    /// Active time in nanoseconds. Must not exceed the period.
    pub duty_ns: u32,
    /// Output polarity.
    #[serde(default)]
    pub polarity: Polarity,
}

impl ChannelConfig {
    /// Create a normal-polarity configuration.
    #[must_use]
    pub fn new(channel: u32, period_ns: u32, duty_ns: u32) -> Self {
        Self {
            channel,
            period_ns,
            duty_ns,
            polarity: Polarity::Normal,
        }
    }

    /// Set the polarity.
    #[must_use]
    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Check the waveform parameters before they reach the hardware.
    ///
    /// # Errors
    ///
    /// Returns [`SscError::ConfigurationFailed`] for a zero period or a duty
    /// time longer than the period.
    pub fn validate(&self) -> SscResult<()> {
        if self.period_ns == 0 {
            return Err(SscError::ConfigurationFailed {
                channel: self.channel,
                reason: "period must be non-zero".into(),
            });
        }
        if self.duty_ns > self.period_ns {
            return Err(SscError::ConfigurationFailed {
                channel: self.channel,
                reason: format!(
                    "duty {}ns exceeds period {}ns",
                    self.duty_ns, self.period_ns
                ),
            });
        }
        Ok(())
    }

    /// Output frequency in Hz, truncated. Zero for an unvalidated zero period.
    #[must_use]
    pub fn frequency_hz(&self) -> u32 {
        NSEC_PER_SEC.checked_div(self.period_ns).unwrap_or(0)
    }
}

/// The three channel configurations, one per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSet {
    /// Bit clock.
    pub clock: ChannelConfig,
    /// Frame sync.
    pub sync: ChannelConfig,
    /// Capture stamp.
    pub stamp: ChannelConfig,
}

impl SignalSet {
    /// Configuration for a role.
    #[must_use]
    pub fn get(&self, role: SignalRole) -> &ChannelConfig {
        match role {
            SignalRole::Clock => &self.clock,
            SignalRole::Sync => &self.sync,
            SignalRole::Stamp => &self.stamp,
        }
    }

    /// Validate every role and reject channel numbers used twice.
    ///
    /// # Errors
    ///
    /// Returns the first per-channel validation error, or
    /// [`SscError::ChannelUnavailable`] for a duplicated channel.
    pub fn validate(&self) -> SscResult<()> {
        for role in SignalRole::ALL {
            self.get(role).validate()?;
        }
        for (i, a) in SignalRole::ALL.iter().enumerate() {
            for b in &SignalRole::ALL[i + 1..] {
                let channel = self.get(*a).channel;
                if channel == self.get(*b).channel {
                    return Err(SscError::ChannelUnavailable {
                        channel,
                        reason: format!("shared by {a} and {b}"),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for SignalSet {
    /// 24 kHz bit clock with a 64-bit frame.
    fn default() -> Self {
        const CLOCK_PERIOD_NS: u32 = 41_667;
        const FRAME_PERIOD_NS: u32 = CLOCK_PERIOD_NS * 64;

        Self {
            clock: ChannelConfig::new(0, CLOCK_PERIOD_NS, CLOCK_PERIOD_NS / 2),
            sync: ChannelConfig::new(1, FRAME_PERIOD_NS, CLOCK_PERIOD_NS),
            stamp: ChannelConfig::new(2, FRAME_PERIOD_NS, CLOCK_PERIOD_NS),
        }
    }
}

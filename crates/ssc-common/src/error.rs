use thiserror::Error;

/// Errors raised while acquiring, configuring, or driving the PWM channels.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SscError {
    /// The requested channel is already owned or does not exist.
    #[error("PWM{channel} unavailable: {reason}")]
    ChannelUnavailable {
        /// Hardware channel number.
        channel: u32,
        /// Reason reported by the hardware layer.
        reason: String,
    },

    /// The hardware rejected the period, duty cycle, or polarity.
    #[error("PWM{channel} configuration failed: {reason}")]
    ConfigurationFailed {
        /// Hardware channel number.
        channel: u32,
        /// Reason reported by the hardware layer.
        reason: String,
    },

    /// The hardware refused to arm capture on the stamp channel.
    #[error("PWM{channel} capture could not be armed: {reason}")]
    CaptureFailed {
        /// Hardware channel number.
        channel: u32,
        /// Reason reported by the hardware layer.
        reason: String,
    },

    /// The clock/sync alignment pulse failed.
    #[error("could not sync PWM channels: {0}")]
    SyncFailed(String),

    /// The channels have already been released.
    #[error("PWM channels already released")]
    Released,
}

impl SscError {
    /// Whether repeating the failed call may succeed.
    ///
    /// Only a failed alignment pulse qualifies: `enable()` is idempotent, so
    /// re-issuing it is safe. Every other error points at misconfiguration or
    /// a missing resource.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SyncFailed(_))
    }

    /// Hardware channel the error refers to, if any.
    #[must_use]
    pub fn channel(&self) -> Option<u32> {
        match self {
            Self::ChannelUnavailable { channel, .. }
            | Self::ConfigurationFailed { channel, .. }
            | Self::CaptureFailed { channel, .. } => Some(*channel),
            Self::SyncFailed(_) | Self::Released => None,
        }
    }
}

/// Convenience type alias for PWM-SSC operations.
pub type SscResult<T> = Result<T, SscError>;

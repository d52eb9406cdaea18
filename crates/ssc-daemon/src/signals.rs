//! Signal handling for the daemon.
//!
//! SIGTERM and SIGINT request teardown; SIGHUP requests a fresh alignment
//! pulse, the daemon's equivalent of writing `1` to `enable`. Handlers only
//! touch atomics; a poll thread forwards them into shared state.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Signal types that the daemon handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM - graceful termination request.
    Terminate,
    /// SIGINT - interrupt (Ctrl+C).
    Interrupt,
    /// SIGHUP - resynchronize the PWM channels.
    Hangup,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
            SignalKind::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Flags shared between the poll thread and the main loop.
#[derive(Debug, Default)]
pub struct SignalState {
    shutdown_requested: AtomicBool,
    resync_requested: AtomicBool,
    signal_count: AtomicU32,
}

impl SignalState {
    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Check if a resync has been requested (and clear the flag).
    #[inline]
    pub fn take_resync_request(&self) -> bool {
        self.resync_requested.swap(false, Ordering::Relaxed)
    }

    /// Request shutdown (can be called from any thread).
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }

    /// Request a resync (can be called from any thread).
    pub fn request_resync(&self) {
        self.resync_requested.store(true, Ordering::Relaxed);
    }

    fn record_signal(&self, kind: SignalKind) {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
        debug!(%kind, "Signal recorded");
    }

    /// Get the total number of signals received.
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }
}

static SHUTDOWN_FLAG: AtomicBool = AtomicBool::new(false);
static INTERRUPT_FLAG: AtomicBool = AtomicBool::new(false);
static HANGUP_FLAG: AtomicBool = AtomicBool::new(false);

/// Handle for signal management.
#[derive(Clone)]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    /// Create a handler and register SIGTERM, SIGINT and SIGHUP on Unix.
    pub fn new() -> std::io::Result<Self> {
        let handler = Self {
            state: Arc::new(SignalState::default()),
        };

        #[cfg(unix)]
        handler.register_unix_handlers()?;

        Ok(handler)
    }

    #[cfg(unix)]
    #[allow(unsafe_code)]
    fn register_unix_handlers(&self) -> std::io::Result<()> {
        use std::os::raw::c_int;

        extern "C" fn on_sigterm(_: c_int) {
            SHUTDOWN_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn on_sigint(_: c_int) {
            INTERRUPT_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn on_sighup(_: c_int) {
            HANGUP_FLAG.store(true, Ordering::Relaxed);
        }

        let state = Arc::clone(&self.state);
        std::thread::Builder::new()
            .name("ssc-signals".into())
            .spawn(move || loop {
                if SHUTDOWN_FLAG.swap(false, Ordering::Relaxed) {
                    info!("SIGTERM received");
                    state.record_signal(SignalKind::Terminate);
                    state.request_shutdown();
                }
                if INTERRUPT_FLAG.swap(false, Ordering::Relaxed) {
                    info!("SIGINT received");
                    state.record_signal(SignalKind::Interrupt);
                    state.request_shutdown();
                }
                if HANGUP_FLAG.swap(false, Ordering::Relaxed) {
                    info!("SIGHUP received, resync requested");
                    state.record_signal(SignalKind::Hangup);
                    state.request_resync();
                }
                if state.shutdown_requested() {
                    break;
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
            })?;

        // SAFETY: the handlers only store to static atomics, which is
        // async-signal-safe.
        unsafe {
            libc::signal(libc::SIGTERM, on_sigterm as libc::sighandler_t);
            libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
            libc::signal(libc::SIGHUP, on_sighup as libc::sighandler_t);
        }

        debug!("Unix signal handlers registered");
        Ok(())
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.state.shutdown_requested()
    }

    /// Check if a resync has been requested (clears the flag).
    #[inline]
    pub fn take_resync_request(&self) -> bool {
        self.state.take_resync_request()
    }

    /// Manually request shutdown.
    pub fn request_shutdown(&self) {
        info!("Manual shutdown requested");
        self.state.request_shutdown();
    }

    /// Get the signal state for inspection.
    pub fn state(&self) -> &SignalState {
        &self.state
    }
}

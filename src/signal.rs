//! Graceful shutdown on Ctrl+C and termination signals.
//!
//! A signal sets a shared `AtomicBool`. Scans and prunes poll that flag and
//! stop at the next entry; database writes already in flight complete first.
//!
//! ```rust,no_run
//! use dupescan::engine::ScanConfig;
//! use dupescan::signal::install_handler;
//!
//! let handler = install_handler().expect("signal handler");
//! let config = ScanConfig::default().with_shutdown_flag(handler.get_flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code after an interrupt (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request a shutdown without a signal.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to hand to [`ScanConfig`](crate::engine::ScanConfig) or
    /// [`Reconciler`](crate::engine::Reconciler).
    ///
    /// # Returns
    ///
    /// A clone of the shared flag. Storing `true` through it is the same as
    /// calling [`request_shutdown`](Self::request_shutdown).
    ///
    /// # Example
    ///
    /// ```
    /// use dupescan::signal::ShutdownHandler;
    /// use std::sync::atomic::Ordering;
    ///
    /// let handler = ShutdownHandler::new();
    /// let flag = handler.get_flag();
    /// flag.store(true, Ordering::SeqCst);
    /// assert!(handler.is_shutdown_requested());
    /// ```
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide signal hook and return its handler.
///
/// Later calls in the same process return the first handler with its flag
/// cleared. If another hook already owns the signal, an unhooked handler is
/// returned; it still honors [`ShutdownHandler::request_shutdown`].
///
/// # Arguments
///
/// None. The hook is global to the process.
///
/// # Returns
///
/// A [`ShutdownHandler`] whose flag is raised by Ctrl+C (and SIGTERM where
/// the platform supports it).
///
/// # Errors
///
/// Returns [`SignalError`] only as part of the signature; a hook that cannot
/// be installed falls back to an unhooked handler instead.
///
/// # Example
///
/// ```no_run
/// use dupescan::signal::install_handler;
///
/// let handler = install_handler()?;
/// while !handler.is_shutdown_requested() {
///     // do one unit of work
/// #   break;
/// }
/// # Ok::<(), dupescan::signal::SignalError>(())
/// ```
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();
    let hooked = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(
            std::io::stderr(),
            "\nInterrupted. Finishing pending writes..."
        );
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    });

    match hooked {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler);
        }
        Err(e) => {
            log::debug!("Signal hook unavailable ({e}), using unhooked handler");
            let _ = GLOBAL_HANDLER.set(ShutdownHandler::new());
        }
    }
    let handler = GLOBAL_HANDLER.get_or_init(ShutdownHandler::new);
    handler.reset();
    Ok(handler.clone())
}

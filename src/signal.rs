//! Cancellation sources for a verification run.
//!
//! Two things can stop a run:
//! - a process interrupt (Ctrl+C / SIGINT), caught by [`install_handler`]
//! - a `q` key press while the progress display is live, caught by [`KeyWatcher`]
//!
//! Both set the same [`ShutdownHandler`] flag, which the controller checks
//! once per loop iteration.
//!
//! # Usage
//!
//! ```rust,no_run
//! use filevet::signal::install_handler;
//!
//! let handler = install_handler().expect("Failed to install signal handler");
//!
//! if handler.is_shutdown_requested() {
//!     println!("Shutdown requested, cleaning up...");
//! }
//! ```
//!
//! # Exit Codes
//!
//! A cancelled run exits with code 130 (128 + SIGINT), whichever source
//! triggered it.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

/// Exit code for an interrupted run (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared cancellation flag.
///
/// Cloning shares the flag; [`get_flag`](Self::get_flag) hands the raw
/// `Arc<AtomicBool>` to the scheduler so verifier processes can observe it.
#[derive(Debug, Clone)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `true` once Ctrl+C, `q`, or [`request_shutdown`](Self::request_shutdown) fired.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clone of the underlying flag.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
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

/// Install a Ctrl+C handler that sets the shutdown flag on interrupt.
///
/// Safe to call more than once: later calls reset and return the handler
/// registered first. If the process already has a foreign handler (e.g.
/// parallel tests), an unhooked handler is returned instead, which still
/// honours [`ShutdownHandler::request_shutdown`].
///
/// # Errors
///
/// Currently always succeeds; the `Result` is kept so callers propagate
/// installation failures should the fallback ever be removed.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    match ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);

        let _ = writeln!(io::stderr(), "\nInterrupted. Stopping verifiers...");
        let _ = io::stderr().flush();

        log::info!("Interrupt signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(handler)
        }
        Err(e) => {
            if let Some(handler) = GLOBAL_HANDLER.get() {
                handler.reset();
                Ok(handler.clone())
            } else {
                log::debug!("Ctrl+C handler unavailable ({}), using unhooked handler", e);
                let fallback = ShutdownHandler::new();
                let _ = GLOBAL_HANDLER.set(fallback.clone());
                Ok(fallback)
            }
        }
    }
}

/// Create a handler without installing any signal hooks.
///
/// ```
/// use filevet::signal::create_handler;
/// let handler = create_handler();
/// assert!(!handler.is_shutdown_requested());
/// ```
#[must_use]
pub fn create_handler() -> ShutdownHandler {
    ShutdownHandler::new()
}

/// Whether a key press should cancel the run.
///
/// `q`/`Q` cancel, and so does Ctrl+C, which arrives as a key event rather
/// than a signal while raw mode is on.
#[must_use]
pub fn is_cancel_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Background watcher that turns a `q` key press into a shutdown request.
///
/// Puts the terminal into raw mode for its lifetime; dropping the watcher
/// stops the thread and restores the terminal.
#[derive(Debug)]
pub struct KeyWatcher {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl KeyWatcher {
    const POLL: Duration = Duration::from_millis(50);

    /// Enable raw mode and start watching for the cancel key.
    ///
    /// # Errors
    ///
    /// Returns an error if raw mode cannot be enabled or the thread cannot
    /// be spawned; raw mode is left disabled in either case.
    pub fn spawn(handler: ShutdownHandler) -> io::Result<Self> {
        terminal::enable_raw_mode()?;

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let spawned = thread::Builder::new()
            .name("filevet-keys".to_string())
            .spawn(move || watch_keys(&handler, &thread_stop));

        match spawned {
            Ok(thread) => Ok(Self {
                stop,
                thread: Some(thread),
            }),
            Err(e) => {
                let _ = terminal::disable_raw_mode();
                Err(e)
            }
        }
    }
}

fn watch_keys(handler: &ShutdownHandler, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) && !handler.is_shutdown_requested() {
        match event::poll(KeyWatcher::POLL) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if is_cancel_key(&key) => {
                    log::info!("Cancel key pressed");
                    handler.request_shutdown();
                }
                Ok(_) => {}
                Err(e) => {
                    log::debug!("Key watcher stopped: {}", e);
                    return;
                }
            },
            Ok(false) => {}
            Err(e) => {
                log::debug!("Key watcher stopped: {}", e);
                return;
            }
        }
    }
}

impl Drop for KeyWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

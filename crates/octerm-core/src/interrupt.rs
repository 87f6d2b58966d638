//! Ctrl+C handling for non-interactive modes.
//!
//! The first Ctrl+C cancels the process-wide [`CancellationToken`]; streams
//! started from a child of that token wind down on their own. A second
//! Ctrl+C runs the restore hook (if any) and exits with status 130.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static ROOT_TOKEN: OnceLock<CancellationToken> = OnceLock::new();
static RESTORE_HOOK: OnceLock<Box<dyn Fn() + Send + Sync>> = OnceLock::new();

/// Exit status used when the user interrupts the process.
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug)]
pub struct InterruptedError;

impl std::fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for InterruptedError {}

/// Installs the Ctrl+C handler. The handler prints nothing.
///
/// # Panics
/// Panics if registering the Ctrl+C handler fails.
pub fn init() {
    ctrlc::set_handler(trigger_ctrl_c).expect("Error setting Ctrl+C handler");
}

fn root_token() -> &'static CancellationToken {
    ROOT_TOKEN.get_or_init(CancellationToken::new)
}

/// Returns a token cancelled by the next Ctrl+C.
pub fn cancellation_token() -> CancellationToken {
    root_token().child_token()
}

/// Handles one Ctrl+C, force-exiting on the second.
pub fn trigger_ctrl_c() {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        if let Some(hook) = RESTORE_HOOK.get() {
            hook();
        }
        std::process::exit(EXIT_INTERRUPTED);
    }
    root_token().cancel();
}

/// Checks if an interrupt has been requested.
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Registers a hook run before the forced exit on a second Ctrl+C.
pub fn set_restore_hook<F>(hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    let _ = RESTORE_HOOK.set(Box::new(hook));
}

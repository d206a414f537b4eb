//! Shutdown signal handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Install a Ctrl-C handler and return the daemon's running flag.
///
/// The flag starts true and is cleared on the first signal; every worker
/// thread polls it.
pub fn install_shutdown_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        flag.store(false, Ordering::Relaxed);
    })?;
    Ok(running)
}

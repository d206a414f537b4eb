//! Small process-level helpers.

mod clock;
mod signal;

pub use clock::{now_us, secs_to_us};
pub use signal::install_shutdown_handler;

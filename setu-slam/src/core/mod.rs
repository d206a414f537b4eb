//! Core foundation layer.
//!
//! Bottom of the stack with no internal dependencies.
//!
//! - [`types`]: poses, scans, sensor messages
//! - [`math`]: angle normalization and interpolation

pub mod math;
pub mod types;

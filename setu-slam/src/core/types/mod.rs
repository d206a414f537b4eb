//! Core data types for SLAM operations.
//!
//! - [`Point2D`], [`Pose2D`]: planar geometry
//! - [`Timestamped<T>`]: generic timestamp wrapper
//! - [`RangeScan`], [`LaserDescriptor`], [`LocalizedScan`]: range data before and after graph insertion
//! - [`OdometrySample`], [`FiducialDetections`]: auxiliary sensor messages

mod observation;
mod pose;
mod scan;
mod timestamped;

pub use observation::{FiducialDetection, FiducialDetections, OdometrySample};
pub use pose::{Point2D, Pose2D};
pub use scan::{LaserDescriptor, LocalizedScan, RangeScan};
pub use timestamped::Timestamped;

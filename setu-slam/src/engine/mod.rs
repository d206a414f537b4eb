//! Mapping back end.
//!
//! - [`graph`]: scan graph, solver graph and optimizer
//! - [`mapper`]: turns admitted scans into vertices and constraints
//! - [`dataset`]: raw readings and laser descriptors kept with the graph

pub mod dataset;
pub mod graph;
pub mod mapper;

pub use dataset::{Dataset, DatasetScan};
pub use mapper::{MapperConfig, OdometryMapper, PoseGraphMapper};

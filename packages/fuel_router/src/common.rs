//! Shared building blocks used by every stage of the pipeline: coordinates,
//! graph weights, configuration and the crate-wide error type.

pub mod config;
pub mod error;
pub mod geometry;
pub mod graph_data;

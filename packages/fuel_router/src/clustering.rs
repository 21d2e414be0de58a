//! Reduction of raw GPS fixes into the small set of waypoints which anchor
//! the vertices of the routing graph.

pub mod kmeans;

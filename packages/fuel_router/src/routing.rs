//! This module defines the search for the cheapest route through the
//! waypoint graph, and the structs used to hand the result back to callers.

pub mod solver;
pub mod structs;

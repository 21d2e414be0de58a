//! This module focuses on reading historical drives from disk and folding
//! them into a petgraph graph object which can be searched for the cheapest
//! route.

pub mod csv;
pub mod ladder;
pub mod petgraph;

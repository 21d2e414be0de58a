//! Fuel-cost routing from recorded drives. GPS fixes are clustered into
//! waypoints, each drive is reduced to a ladder of per-segment fuel costs
//! between the waypoints it passed, and the ladders are merged into a
//! directed graph which is searched for the cheapest way from any drive's
//! beginning to any drive's end.

pub mod clustering;
pub mod common;
pub mod loading;
pub mod pipeline;
pub mod routing;
pub mod telemetry;

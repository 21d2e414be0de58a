//! Conversion of raw on-board diagnostics readings into the fuel flow
//! figures which drive the edge costs of the waypoint graph.

pub mod fuel;
pub mod obd;
pub mod sample;

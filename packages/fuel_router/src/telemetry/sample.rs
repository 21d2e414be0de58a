//! The unit of recorded driving data which every later stage consumes.

use crate::common::geometry::GeoPoint;
use serde::Serialize;

/// A single GPS fix from a drive, paired with the speed and instantaneous
/// fuel flow recorded closest to it. Samples within a drive are ordered by
/// time
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DriveSample {
    /// Milliseconds since the epoch
    pub time_ms: i64,
    pub point: GeoPoint,
    /// km/h
    pub speed: f64,
    /// l/h
    pub fuel_rate: f64,
}

impl DriveSample {
    pub fn new(
        time_ms: i64,
        lat: f64,
        lon: f64,
        speed: f64,
        fuel_rate: f64,
    ) -> DriveSample {
        DriveSample {
            time_ms,
            point: GeoPoint::new(lat, lon),
            speed,
            fuel_rate,
        }
    }
}

//! Defines the coordinate type which flows through the whole pipeline, along
//! with the distance measure used to compare coordinates with one another

use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

/// A single latitude/longitude pair, in degrees. Points are compared by
/// value; no tolerance is applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint { lat, lon }
    }

    /// Bit-level identity of the point, used where points need to be hashed
    /// (e.g. removing duplicates before sampling cluster centres)
    pub fn bits(&self) -> (u64, u64) {
        (self.lat.to_bits(), self.lon.to_bits())
    }
}

impl From<GeoPoint> for Point {
    fn from(point: GeoPoint) -> Point {
        // geo works in x/y order, which is lon/lat
        Point::new(point.lon, point.lat)
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((lat, lon): (f64, f64)) -> GeoPoint {
        GeoPoint { lat, lon }
    }
}

/// Great-circle distance between two points in metres
pub fn geo_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    Haversine::distance(Point::from(*p1), Point::from(*p2))
}

/// Find the position of the point in `candidates` which is closest to
/// `point`, along with the distance to it. Ties go to the candidate which
/// appears first. Returns None if no candidates are provided
pub fn nearest(point: &GeoPoint, candidates: &[GeoPoint]) -> Option<(usize, f64)> {
    let mut closest: Option<(usize, f64)> = None;
    for (inx, candidate) in candidates.iter().enumerate() {
        let dist = geo_distance(point, candidate);
        match closest {
            Some((_, best)) if dist >= best => (),
            _ => closest = Some((inx, dist)),
        }
    }
    closest
}

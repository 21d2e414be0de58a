//! Sets the data which will be stored as weights in the petgraph graph built
//! from historical drives. Vertices are identified by a structured key rather
//! than by their coordinates directly, so that floating point noise can never
//! split one waypoint into two vertices.

use crate::common::geometry::GeoPoint;
use serde::Serialize;

/// Coordinates are quantised to 1e-7 degrees (roughly 1cm) when forming keys
const COORD_SCALE: f64 = 1e7;

/// Width of the speed buckets which form part of vertex identity
pub const SPEED_BUCKET_WIDTH: f64 = 5.0;

/// Coordinates reserved for the start sentinel, outside the valid range
pub const START_SENTINEL: GeoPoint = GeoPoint {
    lat: -200.0,
    lon: -200.0,
};

/// Coordinates reserved for the end sentinel, outside the valid range
pub const END_SENTINEL: GeoPoint = GeoPoint {
    lat: 200.0,
    lon: 200.0,
};

/// Round a speed down to the nearest multiple of 5
pub fn speed_bucket(speed: f64) -> i32 {
    ((speed / SPEED_BUCKET_WIDTH).floor() * SPEED_BUCKET_WIDTH) as i32
}

/// Identity of a vertex in the waypoint graph. The two sentinels can never
/// collide with a real waypoint, whatever its coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VertexKey {
    Start,
    End,
    Waypoint {
        lat_e7: i64,
        lon_e7: i64,
        speed_bucket: i32,
    },
}

impl VertexKey {
    /// Build the key for a waypoint visited in the provided speed bucket
    pub fn waypoint(point: &GeoPoint, speed_bucket: i32) -> VertexKey {
        VertexKey::Waypoint {
            lat_e7: (point.lat * COORD_SCALE).round() as i64,
            lon_e7: (point.lon * COORD_SCALE).round() as i64,
            speed_bucket,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, VertexKey::Waypoint { .. })
    }
}

/// Node weight: the key plus the data needed to report a route back to the
/// user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexData {
    pub key: VertexKey,
    pub point: GeoPoint,
    pub speed_bucket: i32,
}

impl VertexData {
    pub fn start() -> VertexData {
        VertexData {
            key: VertexKey::Start,
            point: START_SENTINEL,
            speed_bucket: 0,
        }
    }

    pub fn end() -> VertexData {
        VertexData {
            key: VertexKey::End,
            point: END_SENTINEL,
            speed_bucket: 0,
        }
    }

    pub fn waypoint(point: GeoPoint, speed_bucket: i32) -> VertexData {
        VertexData {
            key: VertexKey::waypoint(&point, speed_bucket),
            point,
            speed_bucket,
        }
    }
}

/// Edge weight. Observations are accumulated while drives are merged in, and
/// are only averaged once all drives have been seen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeCost {
    pub samples: u32,
    pub cost_sum: f64,
    mean: Option<f64>,
}

impl EdgeCost {
    /// Start a new accumulator from a single observation
    pub fn new(cost: f64) -> EdgeCost {
        EdgeCost {
            samples: 1,
            cost_sum: cost,
            mean: None,
        }
    }

    /// Record another traversal of the same edge
    pub fn observe(&mut self, cost: f64) {
        self.samples += 1;
        self.cost_sum += cost;
    }

    /// Fix the cost of this edge to the mean of all observations. Repeated
    /// calls leave the stored mean untouched
    pub fn finalize(&mut self) {
        if self.mean.is_none() {
            self.mean = Some(self.cost_sum / self.samples as f64);
        }
    }

    /// The averaged cost, available once the edge has been finalized
    pub fn cost(&self) -> Option<f64> {
        self.mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Speeds should be floored to a multiple of 5
    #[test]
    fn test_speed_bucket() {
        assert_eq!(speed_bucket(0.0), 0);
        assert_eq!(speed_bucket(4.9), 0);
        assert_eq!(speed_bucket(30.0), 30);
        assert_eq!(speed_bucket(32.0), 30);
        assert_eq!(speed_bucket(28.0), 25);
    }

    /// Two points which differ only by floating point noise must share a key
    #[test]
    fn test_waypoint_key_quantised() {
        let k1 = VertexKey::waypoint(&GeoPoint::new(10.1 + 0.2, 10.0), 30);
        let k2 = VertexKey::waypoint(&GeoPoint::new(10.3, 10.0), 30);

        assert_eq!(k1, k2);
    }

    /// The speed bucket forms part of vertex identity
    #[test]
    fn test_waypoint_key_speed() {
        let point = GeoPoint::new(10.0, 10.0);

        assert_ne!(
            VertexKey::waypoint(&point, 30),
            VertexKey::waypoint(&point, 35)
        );
    }

    /// Sentinels must never match a waypoint, even one placed on the
    /// reserved coordinates
    #[test]
    fn test_sentinels_distinct() {
        let fake_end = VertexData::waypoint(END_SENTINEL, 0);

        assert_ne!(fake_end.key, VertexKey::End);
        assert!(VertexKey::End.is_sentinel());
        assert!(!fake_end.key.is_sentinel());
    }

    /// Accumulated observations should be averaged on finalization
    #[test]
    fn test_edge_cost_mean() {
        let mut edge = EdgeCost::new(1.0);
        edge.observe(2.0);
        edge.observe(6.0);

        assert!(edge.cost().is_none());

        edge.finalize();

        assert_eq!(edge.samples, 3);
        assert_abs_diff_eq!(edge.cost().unwrap(), 3.0);
    }

    /// A second finalization must not alter the stored mean
    #[test]
    fn test_edge_cost_finalize_idempotent() {
        let mut edge = EdgeCost::new(1.0);
        edge.observe(2.0);
        edge.finalize();
        let first = edge.cost();

        edge.finalize();

        assert_eq!(edge.cost(), first);
    }
}

//! Defines the structs which hold a solved route, in a form which can be
//! handed straight to the frontend or written to disk

use serde::Serialize;
use serde_json::{Value, json};

/// A single waypoint on a solved route. The incremental cost is the fuel
/// needed to get from this waypoint to the next one, and is 0 for the last
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteStep {
    pub lat: f64,
    pub lon: f64,
    pub speed: i32,
    pub incremental_cost: f64,
}

/// The cheapest known route, ordered in the direction of travel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub steps: Vec<RouteStep>,
    pub total_cost: f64,
}

impl Route {
    /// Render the route as a GeoJSON FeatureCollection with one point per
    /// step. GeoJSON expects coordinates in lon/lat order
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .steps
            .iter()
            .map(|step| {
                json!({
                    "type": "Feature",
                    "properties": {
                        "speed": step.speed,
                        "incremental_cost": step.incremental_cost,
                    },
                    "geometry": {
                        "type": "Point",
                        "coordinates": [step.lon, step.lat],
                    },
                })
            })
            .collect();

        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }
}

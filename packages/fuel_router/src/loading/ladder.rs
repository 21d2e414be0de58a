//! Reduces a single drive to a cost ladder: the ordered list of waypoints
//! the drive passed through, along with the fuel it took to get from each
//! one to the next.
//!
//! Every sample is snapped to its nearest waypoint, but only one sample per
//! waypoint is used to mark the moment the drive passed it. This is the
//! sample which came closest to the waypoint over the whole drive (the
//! earliest one, if several came equally close). Fuel is accumulated between
//! consecutive samples, and the running total is closed off each time one of
//! these canonical samples is reached.

use crate::common::geometry::{GeoPoint, nearest};
use crate::common::graph_data::speed_bucket;
use crate::telemetry::fuel::sample_cost;
use crate::telemetry::sample::DriveSample;
use rayon::prelude::*;

/// A single rung of a cost ladder. The segment cost is the fuel used to get
/// from this waypoint to the next one on the ladder, and is 0 for the final
/// rung
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderEntry {
    pub point: GeoPoint,
    pub speed_bucket: i32,
    pub segment_cost: f64,
}

/// Snap every sample to its nearest waypoint, returning the index of the
/// waypoint and the distance to it
fn snap_samples(
    samples: &[DriveSample],
    waypoints: &[GeoPoint],
) -> Vec<Option<(usize, f64)>> {
    samples
        .par_iter()
        .map(|sample| nearest(&sample.point, waypoints))
        .collect()
}

/// Determine which samples are the canonical occurrence of their waypoint
fn mark_canonical(snapped: &[Option<(usize, f64)>], n_waypoints: usize) -> Vec<bool> {
    let mut closest: Vec<Option<f64>> = vec![None; n_waypoints];
    for (inx, dist) in snapped.iter().flatten() {
        match closest[*inx] {
            Some(best) if best <= *dist => (),
            _ => closest[*inx] = Some(*dist),
        }
    }

    let mut claimed = vec![false; n_waypoints];
    snapped
        .iter()
        .map(|snap| match snap {
            Some((inx, dist)) => {
                if !claimed[*inx] && closest[*inx] == Some(*dist) {
                    claimed[*inx] = true;
                    true
                } else {
                    false
                }
            }
            None => false,
        })
        .collect()
}

/// Build the cost ladder for a single drive. Samples must be in time order.
/// The ladder holds at most one entry per waypoint, in the order the drive
/// passed them
pub fn build_cost_ladder(
    samples: &[DriveSample],
    waypoints: &[GeoPoint],
) -> Vec<LadderEntry> {
    let snapped = snap_samples(samples, waypoints);
    let canonical = mark_canonical(&snapped, waypoints.len());

    let mut ladder: Vec<LadderEntry> = Vec::new();
    let mut running_cost = 0.0;

    for (inx, sample) in samples.iter().enumerate() {
        // Nothing is accumulated until the first waypoint has been reached
        if !ladder.is_empty() {
            let prev = &samples[inx - 1];
            running_cost += sample_cost(
                prev.time_ms,
                sample.time_ms,
                prev.fuel_rate,
                sample.fuel_rate,
            );
        }

        if !canonical[inx] {
            continue;
        }

        if let Some(last) = ladder.last_mut() {
            last.segment_cost = running_cost;
            running_cost = 0.0;
        }

        // Canonical samples are always snapped
        if let Some((wp_inx, _)) = snapped[inx] {
            ladder.push(LadderEntry {
                point: waypoints[wp_inx],
                speed_bucket: speed_bucket(sample.speed),
                segment_cost: 0.0,
            });
        }
    }

    ladder
}

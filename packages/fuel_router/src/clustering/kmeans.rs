//! Iterative centroid reassignment over GPS fixes. Points are assigned to
//! their nearest centre by great-circle distance, but new centres are the
//! plain arithmetic mean of the member latitudes and longitudes. Over the
//! short distances between waypoints the difference is negligible.
//!
//! A centre which attracts no points during an iteration is dropped rather
//! than re-seeded, so fewer than k waypoints may be returned.

use crate::common::config::ClusterConfig;
use crate::common::error::{FuelRouteError, Result};
use crate::common::geometry::{GeoPoint, nearest};
use crate::loading::csv::save_waypoints;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::fs;
use std::path::Path;

/// Identifies the point in a clustering run at which the centres were
/// captured
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Snapshot {
    Initial,
    Iteration(usize),
}

impl Snapshot {
    pub fn file_name(&self) -> String {
        match self {
            Snapshot::Initial => "initial_choice.csv".to_string(),
            Snapshot::Iteration(inx) => format!("iteration_{inx}.csv"),
        }
    }
}

/// Remove duplicate points, keeping the first occurrence of each
fn distinct_points(points: &[GeoPoint]) -> Vec<GeoPoint> {
    let mut seen = FxHashSet::<(u64, u64)>::default();
    points
        .iter()
        .filter(|point| seen.insert(point.bits()))
        .copied()
        .collect()
}

/// Determine the nearest centre for every point. Ties go to the centre which
/// appears first. Returns None for every point if there are no centres
pub fn assign_points(points: &[GeoPoint], centres: &[GeoPoint]) -> Vec<Option<usize>> {
    points
        .par_iter()
        .map(|point| nearest(point, centres).map(|(inx, _)| inx))
        .collect()
}

/// Run a single round of reassignment, returning the new centres in the
/// same order as the old ones. Centres with no members are dropped
pub fn iterate(points: &[GeoPoint], centres: &[GeoPoint]) -> Vec<GeoPoint> {
    let assignment = assign_points(points, centres);

    let mut sums = vec![(0.0_f64, 0.0_f64, 0_usize); centres.len()];
    for (point, centre) in points.iter().zip(assignment) {
        if let Some(inx) = centre {
            let (lat_sum, lon_sum, count) = &mut sums[inx];
            *lat_sum += point.lat;
            *lon_sum += point.lon;
            *count += 1;
        }
    }

    sums.into_iter()
        .filter(|(_, _, count)| *count > 0)
        .map(|(lat_sum, lon_sum, count)| {
            GeoPoint::new(lat_sum / count as f64, lon_sum / count as f64)
        })
        .collect()
}

/// Shared implementation for all clustering entrypoints. The provided
/// callback is invoked with the initial centres, then again after every
/// iteration
fn run_clustering<F>(
    points: &[GeoPoint],
    config: &ClusterConfig,
    bar: &ProgressBar,
    mut on_snapshot: F,
) -> Result<Vec<GeoPoint>>
where
    F: FnMut(Snapshot, &[GeoPoint]) -> Result<()>,
{
    let target = config.target_count()?;
    let distinct = distinct_points(points);
    if target > distinct.len() {
        return Err(FuelRouteError::Configuration(format!(
            "{target} waypoints were requested, but only {} distinct points are available",
            distinct.len()
        )));
    }

    let mut rng = match config.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };

    let mut centres: Vec<GeoPoint> =
        distinct.choose_multiple(&mut rng, target).copied().collect();
    on_snapshot(Snapshot::Initial, &centres)?;

    info!(
        "Clustering {} points into {target} waypoints over {} iterations",
        points.len(),
        config.iterations
    );

    bar.set_length(config.iterations as u64);
    for inx in 0..config.iterations {
        let updated = iterate(points, &centres);
        if updated.len() < centres.len() {
            warn!(
                "Iteration {inx} dropped {} empty clusters",
                centres.len() - updated.len()
            );
        }
        centres = updated;
        on_snapshot(Snapshot::Iteration(inx), &centres)?;
        debug!("Iteration {inx} complete, {} centres", centres.len());
        bar.inc(1);
    }
    bar.finish();

    Ok(centres)
}

/// Reduce the provided points to at most k waypoints, where k is determined
/// by the route length and point spacing in the config
pub fn cluster(points: &[GeoPoint], config: &ClusterConfig) -> Result<Vec<GeoPoint>> {
    run_clustering(points, config, &ProgressBar::hidden(), |_, _| Ok(()))
}

/// As `cluster`, but writes out the centres after initialisation and after
/// every iteration so that runs can be compared. Progress is reported on the
/// provided bar
pub fn cluster_with_snapshots(
    points: &[GeoPoint],
    config: &ClusterConfig,
    snapshot_dir: &Path,
    bar: &ProgressBar,
) -> Result<Vec<GeoPoint>> {
    fs::create_dir_all(snapshot_dir)?;
    run_clustering(points, config, bar, |snapshot, centres| {
        save_waypoints(&snapshot_dir.join(snapshot.file_name()), centres)
    })
}

/// As `cluster`, reporting progress on the provided bar
pub fn cluster_with_progress(
    points: &[GeoPoint],
    config: &ClusterConfig,
    bar: &ProgressBar,
) -> Result<Vec<GeoPoint>> {
    run_clustering(points, config, bar, |_, _| Ok(()))
}

//! End-to-end preparation of a routing session. Raw logs are optionally
//! combined into drive files, waypoints are loaded or clustered, each drive
//! is reduced to a cost ladder, and the ladders are merged into a single
//! finalized graph which can then be searched.

use crate::clustering::kmeans::{cluster_with_progress, cluster_with_snapshots};
use crate::common::config::{RawLogConfig, ServiceConfig};
use crate::common::error::{FuelRouteError, Result};
use crate::common::geometry::GeoPoint;
use crate::loading::csv::{
    list_csv_files, load_dir_gps_points, load_drive_file, load_gps_file, load_ladder,
    load_obd_file, load_waypoints, save_drive_file, save_ladder, save_route, save_waypoints,
};
use crate::loading::ladder::build_cost_ladder;
use crate::loading::petgraph::{WaypointGraph, finalize_edges, merge_into_graph};
use crate::routing::solver;
use crate::routing::structs::Route;
use crate::telemetry::obd::combine_drive;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Create a progress bar for `len` items, or a hidden one if progress
/// reporting has been switched off
fn get_progress_bar(show_progress: bool, len: u64) -> ProgressBar {
    if show_progress {
        ProgressBar::new(len)
    } else {
        ProgressBar::hidden()
    }
}

/// Select the files in a listing whose name contains `marker`
fn files_marked(files: &[PathBuf], marker: &str) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().contains(marker))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Combine the raw GPS and OBD logs in the configured directory into drive
/// files. GPS and OBD files are matched by their position once sorted by
/// name; the drive file takes the name of the GPS file with the "GPS "
/// marker removed. Returns the number of drive files written
pub fn combine_raw_logs(raw: &RawLogConfig, drives_dir: &Path) -> Result<usize> {
    let files = list_csv_files(&raw.raw_dir)?;
    let gps_files = files_marked(&files, "GPS");
    let obd_files = files_marked(&files, "OBD");

    if gps_files.len() != obd_files.len() {
        return Err(FuelRouteError::Configuration(format!(
            "found {} GPS logs but {} OBD logs in {}",
            gps_files.len(),
            obd_files.len(),
            raw.raw_dir.display()
        )));
    }

    fs::create_dir_all(drives_dir)?;

    for (gps_path, obd_path) in gps_files.iter().zip(obd_files.iter()) {
        let gps = load_gps_file(gps_path)?;
        let obd = load_obd_file(obd_path)?;
        let samples = combine_drive(&gps, &obd, raw.obd_mode, &raw.engine);

        let name = gps_path
            .file_name()
            .map(|name| name.to_string_lossy().replace("GPS ", ""))
            .unwrap_or_default();
        save_drive_file(&drives_dir.join(name), &samples)?;
        debug!(
            "Combined {} and {} into {} samples",
            gps_path.display(),
            obd_path.display(),
            samples.len()
        );
    }

    info!("Combined {} raw log pairs", gps_files.len());
    Ok(gps_files.len())
}

/// Fetch the waypoints for this session. An existing waypoint file is
/// reused, otherwise every GPS fix in the drives directory is clustered and
/// the result is saved for next time
pub fn build_waypoints(config: &ServiceConfig) -> Result<Vec<GeoPoint>> {
    if config.waypoints_path.exists() {
        let waypoints = load_waypoints(&config.waypoints_path)?;
        info!(
            "Loaded {} waypoints from {}",
            waypoints.len(),
            config.waypoints_path.display()
        );
        return Ok(waypoints);
    }

    let points = load_dir_gps_points(&config.drives_dir)?;
    let bar = get_progress_bar(config.show_progress, config.cluster.iterations as u64);

    let waypoints = match &config.snapshot_dir {
        Some(dir) => cluster_with_snapshots(&points, &config.cluster, dir, &bar)?,
        None => cluster_with_progress(&points, &config.cluster, &bar)?,
    };

    if let Some(parent) = config.waypoints_path.parent() {
        fs::create_dir_all(parent)?;
    }
    save_waypoints(&config.waypoints_path, &waypoints)?;
    info!("Generated {} waypoints", waypoints.len());

    Ok(waypoints)
}

/// Build one cost ladder per drive file, saving each under the same file
/// name in the ladders directory. Returns the paths written
pub fn build_ladders(config: &ServiceConfig, waypoints: &[GeoPoint]) -> Result<Vec<PathBuf>> {
    let drives = list_csv_files(&config.drives_dir)?;
    fs::create_dir_all(&config.ladders_dir)?;

    let bar = get_progress_bar(config.show_progress, drives.len() as u64);
    let mut written = Vec::with_capacity(drives.len());

    for drive in drives.iter() {
        let samples = load_drive_file(drive)?;
        let ladder = build_cost_ladder(&samples, waypoints);
        if ladder.len() < 2 {
            warn!(
                "{} passes {} waypoints and will not contribute any edges",
                drive.display(),
                ladder.len()
            );
        }

        let target = match drive.file_name() {
            Some(name) => config.ladders_dir.join(name),
            None => continue,
        };
        save_ladder(&target, &ladder)?;
        debug!("{}: {} samples, {} rungs", drive.display(), samples.len(), ladder.len());

        written.push(target);
        bar.inc(1);
    }
    bar.finish();

    info!("Built {} cost ladders", written.len());
    Ok(written)
}

/// Merge the provided ladder files into a single graph, then finalize its
/// edge costs
pub fn build_graph(ladders: &[PathBuf]) -> Result<WaypointGraph> {
    let mut graph = WaypointGraph::new();

    for path in ladders.iter() {
        let ladder = load_ladder(path)?;
        merge_into_graph(&mut graph, &ladder, true, true)?;
    }
    finalize_edges(&mut graph);

    info!(
        "Graph contains {} vertices and {} edges",
        graph.graph().node_count(),
        graph.graph().edge_count()
    );
    Ok(graph)
}

/// Run every stage required to go from the configured inputs to a
/// searchable graph
pub fn prepare_graph(config: &ServiceConfig) -> Result<WaypointGraph> {
    let now = Instant::now();

    if let Some(raw) = &config.raw_logs {
        combine_raw_logs(raw, &config.drives_dir)?;
    }
    let waypoints = build_waypoints(config)?;
    let ladders = build_ladders(config, &waypoints)?;
    let graph = build_graph(&ladders)?;

    info!("Graph prepared in {:.2?}", now.elapsed());
    Ok(graph)
}

/// Find the cheapest route through a prepared graph
pub fn cheapest_route(graph: &WaypointGraph) -> Result<Route> {
    let now = Instant::now();
    let route = solver::cheapest_route(graph)?;
    info!(
        "Found route with {} steps costing {:.4} in {:.2?}",
        route.steps.len(),
        route.total_cost,
        now.elapsed()
    );
    Ok(route)
}

/// Find the cheapest route through a prepared graph and write it to disk
pub fn save_cheapest_route(graph: &WaypointGraph, path: &Path) -> Result<Route> {
    let route = cheapest_route(graph)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    save_route(path, &route)?;
    info!("Route written to {}", path.display());
    Ok(route)
}

//! The functions defined here read and write every file used by the
//! pipeline: raw GPS & OBD logs, combined drive files, waypoint sets, cost
//! ladders and solved routes. All files are comma separated; only drive
//! files carry a header row.

use crate::common::error::{FuelRouteError, Result};
use crate::common::geometry::GeoPoint;
use crate::loading::ladder::LadderEntry;
use crate::routing::structs::Route;
use crate::telemetry::obd::{GpsFix, ObdCommand, ObdReading};
use crate::telemetry::sample::DriveSample;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const DRIVE_HEADER: [&str; 5] =
    ["Time", "Latitude", "Longitude", "Speed", "Fuel Consumption Rate"];

/// Read every record in a file, converting each with `parse`. Rows for which
/// `parse` returns Ok(None) are skipped. Any failure is reported against the
/// line it occurred on
fn read_records<T, F>(path: &Path, has_headers: bool, mut parse: F) -> Result<Vec<T>>
where
    F: FnMut(&StringRecord) -> std::result::Result<Option<T>, String>,
{
    let mut reader = ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|pos| pos.line()).unwrap_or(0);
        match parse(&record) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => (),
            Err(message) => {
                return Err(FuelRouteError::Parse {
                    path: path.to_path_buf(),
                    line,
                    message,
                });
            }
        }
    }
    Ok(rows)
}

/// Check that a record has at least `min` columns
fn require_columns(record: &StringRecord, min: usize) -> std::result::Result<(), String> {
    if record.len() < min {
        Err(format!("expected at least {min} columns, got {}", record.len()))
    } else {
        Ok(())
    }
}

/// Parse a single column of a record into the requested type
fn parse_field<T: FromStr>(
    record: &StringRecord,
    inx: usize,
    name: &str,
) -> std::result::Result<T, String> {
    let raw = record
        .get(inx)
        .ok_or_else(|| format!("missing {name} column"))?;
    raw.parse::<T>()
        .map_err(|_| format!("invalid {name}: {raw:?}"))
}

/// Timestamps are usually integers, but some loggers write them as floats
fn parse_time(record: &StringRecord, inx: usize) -> std::result::Result<i64, String> {
    match parse_field::<i64>(record, inx, "time") {
        Ok(time) => Ok(time),
        Err(msg) => parse_field::<f64>(record, inx, "time")
            .ok()
            .filter(|time| time.is_finite())
            .map(|time| time as i64)
            .ok_or(msg),
    }
}

/// Load a drive file (time, lat, lon, speed, ..., fuel rate), skipping the
/// header row. The fuel rate is always taken from the final column, so files
/// which include intermediate OBD readings can be read as-is. Rows must not
/// go back in time
pub fn load_drive_file(path: &Path) -> Result<Vec<DriveSample>> {
    let mut prev_time: Option<i64> = None;
    read_records(path, true, |record| {
        require_columns(record, 5)?;
        let time_ms = parse_time(record, 0)?;
        if let Some(prev) = prev_time.filter(|prev| time_ms < *prev) {
            return Err(format!(
                "time {time_ms} is earlier than the previous row ({prev})"
            ));
        }
        prev_time = Some(time_ms);

        Ok(Some(DriveSample {
            time_ms,
            point: GeoPoint::new(
                parse_field(record, 1, "latitude")?,
                parse_field(record, 2, "longitude")?,
            ),
            speed: parse_field(record, 3, "speed")?,
            fuel_rate: parse_field(record, record.len() - 1, "fuel rate")?,
        }))
    })
}

/// Write a drive file, including its header row
pub fn save_drive_file(path: &Path, samples: &[DriveSample]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(DRIVE_HEADER)?;
    for sample in samples {
        writer.serialize((
            sample.time_ms,
            sample.point.lat,
            sample.point.lon,
            sample.speed,
            sample.fuel_rate,
        ))?;
    }
    writer.flush()?;
    Ok(())
}

/// Load the GPS fixes from a drive file, ignoring all other columns
pub fn load_file_gps_points(path: &Path) -> Result<Vec<GeoPoint>> {
    read_records(path, true, |record| {
        require_columns(record, 3)?;
        Ok(Some(GeoPoint::new(
            parse_field(record, 1, "latitude")?,
            parse_field(record, 2, "longitude")?,
        )))
    })
}

/// Load the GPS fixes from every drive file in a directory
pub fn load_dir_gps_points(dir: &Path) -> Result<Vec<GeoPoint>> {
    let mut points = Vec::new();
    for path in list_csv_files(dir)? {
        let file_points = load_file_gps_points(&path)?;
        debug!("Loaded {} points from {}", file_points.len(), path.display());
        points.extend(file_points);
    }
    Ok(points)
}

/// Load a raw GPS log (time, lat, lon), which has no header
pub fn load_gps_file(path: &Path) -> Result<Vec<GpsFix>> {
    read_records(path, false, |record| {
        require_columns(record, 3)?;
        Ok(Some(GpsFix {
            time_ms: parse_time(record, 0)?,
            point: GeoPoint::new(
                parse_field(record, 1, "latitude")?,
                parse_field(record, 2, "longitude")?,
            ),
        }))
    })
}

/// Load a raw OBD log (time, command name, value), which has no header.
/// Commands which are not needed for routing are skipped
pub fn load_obd_file(path: &Path) -> Result<Vec<ObdReading>> {
    read_records(path, false, |record| {
        require_columns(record, 3)?;
        let command = match ObdCommand::from_name(&record[1]) {
            Some(command) => command,
            None => return Ok(None),
        };
        Ok(Some(ObdReading {
            time_ms: parse_time(record, 0)?,
            command,
            value: parse_field(record, 2, "value")?,
        }))
    })
}

/// Load a waypoint set (lat, lon)
pub fn load_waypoints(path: &Path) -> Result<Vec<GeoPoint>> {
    read_records(path, false, |record| {
        require_columns(record, 2)?;
        Ok(Some(GeoPoint::new(
            parse_field(record, 0, "latitude")?,
            parse_field(record, 1, "longitude")?,
        )))
    })
}

/// Write a waypoint set (lat, lon)
pub fn save_waypoints(path: &Path, waypoints: &[GeoPoint]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    for point in waypoints {
        writer.serialize((point.lat, point.lon))?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a cost ladder (lat, lon, speed bucket, segment cost)
pub fn load_ladder(path: &Path) -> Result<Vec<LadderEntry>> {
    read_records(path, false, |record| {
        require_columns(record, 4)?;
        Ok(Some(LadderEntry {
            point: GeoPoint::new(
                parse_field(record, 0, "latitude")?,
                parse_field(record, 1, "longitude")?,
            ),
            speed_bucket: parse_field(record, 2, "speed bucket")?,
            segment_cost: parse_field(record, 3, "segment cost")?,
        }))
    })
}

/// Write a cost ladder (lat, lon, speed bucket, segment cost)
pub fn save_ladder(path: &Path, ladder: &[LadderEntry]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    for entry in ladder {
        writer.serialize((
            entry.point.lat,
            entry.point.lon,
            entry.speed_bucket,
            entry.segment_cost,
        ))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a solved route (lat, lon, speed, incremental cost)
pub fn save_route(path: &Path, route: &Route) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    for step in route.steps.iter() {
        writer.serialize((step.lat, step.lon, step.speed, step.incremental_cost))?;
    }
    writer.flush()?;
    Ok(())
}

/// List every CSV file in a directory, sorted by file name so that repeated
/// runs see the drives in the same order
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

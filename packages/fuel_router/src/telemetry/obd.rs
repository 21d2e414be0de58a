//! Raw GPS and OBD logs are recorded independently of one another. The
//! functions defined here pair every GPS fix with the OBD readings recorded
//! closest to it in time, producing the drive samples used for routing.

use crate::common::error::{FuelRouteError, Result};
use crate::common::geometry::GeoPoint;
use crate::telemetry::fuel::{
    EngineProfile, calculate_fuel_consumption, calculate_maf,
};
use crate::telemetry::sample::DriveSample;
use rustc_hash::FxHashMap;
use std::str::FromStr;

/// Determines which OBD readings the vehicle provides, and therefore how the
/// fuel flow has to be derived
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObdMode {
    /// Engine RPM, intake manifold pressure and air intake temperature
    Rpm,
    /// Mass air flow
    Maf,
    /// Fuel consumption rate, no derivation needed
    Fuel,
}

impl FromStr for ObdMode {
    type Err = FuelRouteError;

    fn from_str(input: &str) -> Result<ObdMode> {
        match input.to_lowercase().as_str() {
            "rpm" => Ok(ObdMode::Rpm),
            "maf" => Ok(ObdMode::Maf),
            "fuel" => Ok(ObdMode::Fuel),
            other => Err(FuelRouteError::Configuration(format!(
                "unknown OBD mode {other:?}"
            ))),
        }
    }
}

/// The OBD commands which are understood, keyed by the names written by the
/// logging app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObdCommand {
    Speed,
    AirIntakeTemp,
    EngineRpm,
    IntakeManifoldPressure,
    MassAirFlow,
    FuelConsumptionRate,
}

impl ObdCommand {
    /// Match the command name as it appears in an OBD log. Unknown commands
    /// return None and are skipped
    pub fn from_name(name: &str) -> Option<ObdCommand> {
        match name.trim() {
            "Vehicle Speed" => Some(ObdCommand::Speed),
            "Air Intake Temperature" => Some(ObdCommand::AirIntakeTemp),
            "Engine RPM" => Some(ObdCommand::EngineRpm),
            "Intake Manifold Pressure" => Some(ObdCommand::IntakeManifoldPressure),
            "Mass Air Flow" => Some(ObdCommand::MassAirFlow),
            "Fuel Consumption Rate" => Some(ObdCommand::FuelConsumptionRate),
            _ => None,
        }
    }
}

/// A single row from a GPS log
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub time_ms: i64,
    pub point: GeoPoint,
}

/// A single row from an OBD log
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObdReading {
    pub time_ms: i64,
    pub command: ObdCommand,
    pub value: f64,
}

/// Time-ordered readings for one command, supporting lookup of the reading
/// nearest to a given time
#[derive(Debug, Default)]
struct ReadingSeries {
    times: Vec<i64>,
    values: Vec<f64>,
}

impl ReadingSeries {
    /// Value of the reading closest in time. Where two readings are equally
    /// close, the earlier one is used
    fn nearest(&self, time_ms: i64) -> Option<f64> {
        let inx = self.times.partition_point(|t| *t < time_ms);

        let before = inx.checked_sub(1);
        let after = if inx < self.times.len() { Some(inx) } else { None };

        let chosen = match (before, after) {
            (Some(b), Some(a)) => {
                let d_before = time_ms - self.times[b];
                let d_after = self.times[a] - time_ms;
                if d_after < d_before { a } else { b }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };

        Some(self.values[chosen])
    }
}

/// Split the raw OBD log into one time-sorted series per command
fn group_readings(obd: &[ObdReading]) -> FxHashMap<ObdCommand, ReadingSeries> {
    let mut sorted: Vec<&ObdReading> = obd.iter().collect();
    sorted.sort_by_key(|reading| reading.time_ms);

    let mut series = FxHashMap::<ObdCommand, ReadingSeries>::default();
    for reading in sorted {
        let entry = series.entry(reading.command).or_default();
        entry.times.push(reading.time_ms);
        entry.values.push(reading.value);
    }
    series
}

/// Combine a GPS log with an OBD log, producing one drive sample per GPS
/// fix in time order. Commands which were never recorded are treated as
/// reading 0
pub fn combine_drive(
    gps: &[GpsFix],
    obd: &[ObdReading],
    mode: ObdMode,
    engine: &EngineProfile,
) -> Vec<DriveSample> {
    let series = group_readings(obd);
    let nearest = |command: ObdCommand, time_ms: i64| -> f64 {
        series
            .get(&command)
            .and_then(|s| s.nearest(time_ms))
            .unwrap_or(0.0)
    };

    let mut fixes: Vec<&GpsFix> = gps.iter().collect();
    fixes.sort_by_key(|fix| fix.time_ms);

    fixes
        .into_iter()
        .map(|fix| {
            let speed = nearest(ObdCommand::Speed, fix.time_ms);
            let fuel_rate = match mode {
                ObdMode::Rpm => {
                    let maf = calculate_maf(
                        nearest(ObdCommand::EngineRpm, fix.time_ms),
                        nearest(ObdCommand::IntakeManifoldPressure, fix.time_ms),
                        nearest(ObdCommand::AirIntakeTemp, fix.time_ms),
                        engine.volumetric_efficiency,
                        engine.engine_displacement,
                    );
                    calculate_fuel_consumption(maf, engine.fuel_type)
                }
                ObdMode::Maf => calculate_fuel_consumption(
                    nearest(ObdCommand::MassAirFlow, fix.time_ms),
                    engine.fuel_type,
                ),
                ObdMode::Fuel => {
                    nearest(ObdCommand::FuelConsumptionRate, fix.time_ms)
                }
            };

            DriveSample {
                time_ms: fix.time_ms,
                point: fix.point,
                speed,
                fuel_rate,
            }
        })
        .collect()
}

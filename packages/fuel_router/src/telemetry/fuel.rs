//! Physical formulas for turning engine readings into a fuel flow, and for
//! turning two fuel flow readings into the fuel used between them. The MAF
//! and fuel flow formulas are taken from "Assessing the impact of driving
//! behavior on instantaneous fuel consumption".

use crate::common::error::{FuelRouteError, Result};
use std::str::FromStr;

pub const MILLIS_IN_HOUR: f64 = 3_600_000.0;

/// J/K/mole
const GAS_CONSTANT: f64 = 8.314;

/// kg air / kmol air
const AIR_MOLAR_MASS: f64 = 28.97;

/// The fuel used by the vehicle, determines the stoichiometric air/fuel
/// ratio and the density used to convert mass flow into volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FuelType {
    Gasoline,
    Diesel,
}

impl FuelType {
    /// Grams of air required to burn one gram of fuel
    pub fn air_fuel_ratio(&self) -> f64 {
        match self {
            FuelType::Gasoline => 14.7,
            FuelType::Diesel => 14.5,
        }
    }

    /// g/dm^3
    pub fn density(&self) -> f64 {
        match self {
            FuelType::Gasoline => 820.0,
            FuelType::Diesel => 750.0,
        }
    }
}

impl FromStr for FuelType {
    type Err = FuelRouteError;

    fn from_str(input: &str) -> Result<FuelType> {
        match input.to_lowercase().as_str() {
            "gasoline" | "petrol" => Ok(FuelType::Gasoline),
            "diesel" => Ok(FuelType::Diesel),
            other => Err(FuelRouteError::Configuration(format!(
                "unknown fuel type {other:?}"
            ))),
        }
    }
}

/// Static properties of the vehicle, only needed when the fuel flow has to
/// be derived from engine RPM
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineProfile {
    pub fuel_type: FuelType,
    /// Ratio of actual to theoretical volumetric flow rate, in %
    pub volumetric_efficiency: f64,
    /// Total volume of the engine's cylinders, in cm^3
    pub engine_displacement: f64,
}

impl Default for EngineProfile {
    fn default() -> EngineProfile {
        EngineProfile {
            fuel_type: FuelType::Gasoline,
            volumetric_efficiency: 80.0,
            engine_displacement: 1999.0,
        }
    }
}

/// Fuel used between two readings, assuming the flow rate changes linearly
/// between them. Times are in ms and rates in l/h, which gives a cost in
/// litres
pub fn sample_cost(time1: i64, time2: i64, rate1: f64, rate2: f64) -> f64 {
    let hours = (time1 - time2).abs() as f64 / MILLIS_IN_HOUR;
    let high = rate1.max(rate2);
    let low = rate1.min(rate2);
    low * hours + ((high - low) * hours) / 2.0
}

/// Mass air flow in g/s, estimated from engine RPM, intake manifold
/// pressure (kPa) and intake air temperature (celsius)
pub fn calculate_maf(
    rpm: f64,
    manifold_pressure: f64,
    intake_temp: f64,
    volumetric_efficiency: f64,
    engine_displacement: f64,
) -> f64 {
    let intake_temp_k = intake_temp + 273.15;
    let imap = rpm * manifold_pressure / intake_temp_k / 2.0;
    ((imap / 60.0)
        * (volumetric_efficiency / 100.0)
        * engine_displacement
        * (AIR_MOLAR_MASS / GAS_CONSTANT))
        / 1000.0
}

/// Fuel flow in l/h for a given mass air flow in g/s
pub fn calculate_fuel_consumption(maf: f64, fuel_type: FuelType) -> f64 {
    (maf * 3600.0) / (fuel_type.air_fuel_ratio() * fuel_type.density())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// A constant rate should simply be multiplied by the elapsed time
    #[test]
    fn test_sample_cost_constant() {
        let result = sample_cost(0, 1_800_000, 2.0, 2.0);

        assert_abs_diff_eq!(result, 1.0);
    }

    /// Changing rates are averaged, regardless of argument order
    #[test]
    fn test_sample_cost_trapezoid() {
        let forward = sample_cost(0, 1000, 2.0, 2.2);
        let backward = sample_cost(1000, 0, 2.2, 2.0);

        assert_abs_diff_eq!(forward, 2.1 / 3600.0, epsilon = 1e-12);
        assert_abs_diff_eq!(forward, backward, epsilon = 1e-15);
    }

    /// Two readings at the same instant cost nothing
    #[test]
    fn test_sample_cost_zero_time() {
        assert_eq!(sample_cost(5, 5, 3.0, 4.0), 0.0);
    }

    /// Check the MAF estimate against a hand calculation
    #[test]
    fn test_calculate_maf() {
        let result = calculate_maf(2000.0, 100.0, 26.85, 80.0, 1999.0);

        assert_abs_diff_eq!(result, 30.957704, epsilon = 1e-5);
    }

    /// Check the fuel flow for both fuel types
    #[test]
    fn test_calculate_fuel_consumption() {
        let gasoline = calculate_fuel_consumption(30.0, FuelType::Gasoline);
        let diesel = calculate_fuel_consumption(30.0, FuelType::Diesel);

        assert_abs_diff_eq!(gasoline, 8.959681, epsilon = 1e-5);
        assert_abs_diff_eq!(diesel, 108000.0 / (14.5 * 750.0), epsilon = 1e-9);
    }

    /// Fuel types should parse case-insensitively
    #[test]
    fn test_fuel_type_from_str() {
        assert_eq!(FuelType::from_str("Diesel").unwrap(), FuelType::Diesel);
        assert_eq!(FuelType::from_str("gasoline").unwrap(), FuelType::Gasoline);
        assert!(FuelType::from_str("hydrogen").is_err());
    }
}

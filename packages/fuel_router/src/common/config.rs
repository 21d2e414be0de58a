//! This module contains the structs which hold the configuration for a
//! routing session. In particular, the ServiceConfig struct is read from the
//! environment when the service starts, and is used to locate every input
//! and output of the pipeline.

use crate::common::error::{FuelRouteError, Result};
use crate::telemetry::fuel::{EngineProfile, FuelType};
use crate::telemetry::obd::ObdMode;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Parameters which control the reduction of raw GPS fixes into waypoints
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    /// Desired spacing between waypoints, in km
    pub point_spacing_km: f64,
    /// Approximate length of the route being modelled, in km
    pub route_length_km: f64,
    /// Number of reassignment rounds, no early stopping is applied
    pub iterations: usize,
    /// Fixed seed for the selection of the initial centres. If not set, the
    /// RNG is seeded from entropy
    pub seed: Option<u64>,
}

impl ClusterConfig {
    /// Determine the number of clusters to create, failing if the provided
    /// lengths do not produce at least one
    pub fn target_count(&self) -> Result<usize> {
        if !(self.point_spacing_km.is_finite() && self.point_spacing_km > 0.0)
        {
            return Err(FuelRouteError::Configuration(format!(
                "point spacing must be a positive number of km, got {}",
                self.point_spacing_km
            )));
        }

        let count = (self.route_length_km / self.point_spacing_km).floor();
        if !count.is_finite() || count < 1.0 {
            return Err(FuelRouteError::Configuration(format!(
                "a route of {}km with {}km spacing gives no waypoints",
                self.route_length_km, self.point_spacing_km
            )));
        }

        Ok(count as usize)
    }
}

impl Default for ClusterConfig {
    fn default() -> ClusterConfig {
        ClusterConfig {
            point_spacing_km: 0.1,
            route_length_km: 10.0,
            iterations: 10,
            seed: None,
        }
    }
}

/// Settings for combining raw GPS & OBD logs into drive files
#[derive(Debug, Clone, PartialEq)]
pub struct RawLogConfig {
    pub raw_dir: PathBuf,
    pub obd_mode: ObdMode,
    pub engine: EngineProfile,
}

/// Everything the service needs to know in order to build its graph and
/// start listening for requests
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub drives_dir: PathBuf,
    pub waypoints_path: PathBuf,
    pub ladders_dir: PathBuf,
    pub snapshot_dir: Option<PathBuf>,
    /// Where to write the cheapest route once the graph is ready, if at all
    pub route_path: Option<PathBuf>,
    pub raw_logs: Option<RawLogConfig>,
    pub cluster: ClusterConfig,
    pub bind_addr: String,
    pub show_progress: bool,
}

impl ServiceConfig {
    /// Read the configuration from FR_ prefixed environment variables. Any
    /// variable which is not set falls back to its default
    pub fn from_env() -> Result<ServiceConfig> {
        ServiceConfig::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration using the provided function to look up each
    /// variable by name
    pub fn from_lookup<F>(lookup: F) -> Result<ServiceConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ClusterConfig::default();

        let cluster = ClusterConfig {
            point_spacing_km: parse_var(
                &lookup,
                "FR_POINT_SPACING_KM",
                defaults.point_spacing_km,
            )?,
            route_length_km: parse_var(
                &lookup,
                "FR_ROUTE_LENGTH_KM",
                defaults.route_length_km,
            )?,
            iterations: parse_var(&lookup, "FR_ITERATIONS", defaults.iterations)?,
            seed: parse_opt_var(&lookup, "FR_SEED")?,
        };

        // Fail early rather than after the drives have been loaded
        cluster.target_count()?;

        let raw_logs = match lookup("FR_RAW_DIR") {
            Some(raw_dir) => {
                let fuel_type: FuelType =
                    parse_var(&lookup, "FR_FUEL_TYPE", FuelType::Gasoline)?;
                let defaults = EngineProfile::default();
                Some(RawLogConfig {
                    raw_dir: PathBuf::from(raw_dir),
                    obd_mode: parse_var(&lookup, "FR_OBD_MODE", ObdMode::Maf)?,
                    engine: EngineProfile {
                        fuel_type,
                        volumetric_efficiency: parse_var(
                            &lookup,
                            "FR_VOLUMETRIC_EFFICIENCY",
                            defaults.volumetric_efficiency,
                        )?,
                        engine_displacement: parse_var(
                            &lookup,
                            "FR_ENGINE_DISPLACEMENT",
                            defaults.engine_displacement,
                        )?,
                    },
                })
            }
            None => None,
        };

        Ok(ServiceConfig {
            drives_dir: path_var(&lookup, "FR_DRIVES_DIR", "data/drives"),
            waypoints_path: path_var(
                &lookup,
                "FR_WAYPOINTS_PATH",
                "data/waypoints.csv",
            ),
            ladders_dir: path_var(&lookup, "FR_LADDERS_DIR", "data/ladders"),
            snapshot_dir: lookup("FR_SNAPSHOT_DIR").map(PathBuf::from),
            route_path: lookup("FR_ROUTE_PATH").map(PathBuf::from),
            raw_logs,
            cluster,
            bind_addr: lookup("FR_BIND_ADDR")
                .unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            show_progress: parse_var(&lookup, "FR_SHOW_PROGRESS", true)?,
        })
    }
}

fn path_var<F>(lookup: &F, name: &str, default: &str) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    PathBuf::from(lookup(name).unwrap_or_else(|| default.to_string()))
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    Ok(parse_opt_var(lookup, name)?.unwrap_or(default))
}

fn parse_opt_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(val) => Ok(Some(val)),
            Err(_) => Err(FuelRouteError::Configuration(format!(
                "{name} has an invalid value: {raw:?}"
            ))),
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    /// Generate a lookup function backed by a fixed set of variables
    fn get_lookup(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Option<String> + use<> {
        let map: FxHashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    /// Success case, 10km route with 100m spacing gives 100 waypoints
    #[test]
    fn test_target_count_ok() {
        let config = ClusterConfig::default();

        assert_eq!(config.target_count().unwrap(), 100);
    }

    /// Partial clusters are floored away
    #[test]
    fn test_target_count_floor() {
        let config = ClusterConfig {
            point_spacing_km: 0.3,
            route_length_km: 1.0,
            ..ClusterConfig::default()
        };

        assert_eq!(config.target_count().unwrap(), 3);
    }

    /// Spacing larger than the route gives no clusters at all
    #[test]
    fn test_target_count_zero() {
        let config = ClusterConfig {
            point_spacing_km: 5.0,
            route_length_km: 1.0,
            ..ClusterConfig::default()
        };

        match config.target_count() {
            Err(FuelRouteError::Configuration(_)) => (),
            other => panic!("Expected a configuration error, got {other:?}"),
        }
    }

    /// Zero spacing would divide by zero
    #[test]
    fn test_target_count_zero_spacing() {
        let config = ClusterConfig {
            point_spacing_km: 0.0,
            ..ClusterConfig::default()
        };

        assert!(config.target_count().is_err());
    }

    /// With nothing set, every default should be applied
    #[test]
    fn test_from_lookup_defaults() {
        let result = ServiceConfig::from_lookup(get_lookup(&[])).unwrap();

        assert_eq!(result.drives_dir, PathBuf::from("data/drives"));
        assert_eq!(result.waypoints_path, PathBuf::from("data/waypoints.csv"));
        assert_eq!(result.ladders_dir, PathBuf::from("data/ladders"));
        assert_eq!(result.snapshot_dir, None);
        assert_eq!(result.route_path, None);
        assert_eq!(result.raw_logs, None);
        assert_eq!(result.cluster, ClusterConfig::default());
        assert_eq!(result.bind_addr, "0.0.0.0:8000");
        assert!(result.show_progress);
    }

    /// Provided values should override the defaults
    #[test]
    fn test_from_lookup_overrides() {
        let lookup = get_lookup(&[
            ("FR_DRIVES_DIR", "/tmp/drives"),
            ("FR_POINT_SPACING_KM", "0.5"),
            ("FR_ROUTE_LENGTH_KM", "20"),
            ("FR_ITERATIONS", "3"),
            ("FR_SEED", "42"),
            ("FR_ROUTE_PATH", "/tmp/route.csv"),
            ("FR_RAW_DIR", "/tmp/raw"),
            ("FR_OBD_MODE", "fuel"),
            ("FR_FUEL_TYPE", "diesel"),
            ("FR_SHOW_PROGRESS", "false"),
        ]);

        let result = ServiceConfig::from_lookup(lookup).unwrap();

        assert_eq!(result.drives_dir, PathBuf::from("/tmp/drives"));
        assert_eq!(result.route_path, Some(PathBuf::from("/tmp/route.csv")));
        assert_eq!(
            result.cluster,
            ClusterConfig {
                point_spacing_km: 0.5,
                route_length_km: 20.0,
                iterations: 3,
                seed: Some(42),
            }
        );
        let raw_logs = result.raw_logs.unwrap();
        assert_eq!(raw_logs.raw_dir, PathBuf::from("/tmp/raw"));
        assert_eq!(raw_logs.obd_mode, ObdMode::Fuel);
        assert_eq!(raw_logs.engine.fuel_type, FuelType::Diesel);
        assert!(!result.show_progress);
    }

    /// Unparseable numbers should be reported against the variable name
    #[test]
    fn test_from_lookup_invalid() {
        let lookup = get_lookup(&[("FR_ITERATIONS", "lots")]);

        match ServiceConfig::from_lookup(lookup) {
            Err(FuelRouteError::Configuration(msg)) => {
                assert!(msg.contains("FR_ITERATIONS"))
            }
            other => panic!("Expected a configuration error, got {other:?}"),
        }
    }

    /// Clustering parameters are validated as soon as they are read
    #[test]
    fn test_from_lookup_invalid_cluster() {
        let lookup = get_lookup(&[("FR_ROUTE_LENGTH_KM", "0")]);

        assert!(ServiceConfig::from_lookup(lookup).is_err());
    }
}

/// Service configuration loader - parses sumps.toml
///
/// Keeps the pump efficiency floor, data-entry defaults and the site
/// registry out of code. The 5 % balance tolerance is a fixed constant
/// (`BALANCE_TOLERANCE_PCT`) and has no config key.
///
/// ```toml
/// [thresholds]
/// efficiency_floor = 0.8
///
/// [defaults]
/// critical_elevation_m = 13.0
/// catchment_ha = 25.0
///
/// [[site]]
/// code = "BTW"
/// name = "Bara Tama Wijaya"
/// pits = ["Sump Utara", "Sump Selatan"]
/// ```
///
/// Every table is optional; missing values fall back to the defaults below.

use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::alert::classify::AlertThresholds;
use crate::model::{HOURS_PER_DAY, RawPumpReading, RawSumpReading, SiteLocation, SiteMap};

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "sumps.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Configuration structures
// ---------------------------------------------------------------------------

/// Values the entry forms pre-fill for a new reading.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InputDefaults {
    pub critical_elevation_m: f64,
    pub catchment_ha: f64,
    pub rain_plan_mm: f64,
    pub discharge_plan_m3h: f64,
    pub ewh_plan_h: f64,
}

impl Default for InputDefaults {
    fn default() -> Self {
        Self {
            critical_elevation_m: 13.0,
            catchment_ha: 25.0,
            rain_plan_mm: 20.0,
            discharge_plan_m3h: 500.0,
            ewh_plan_h: 20.0,
        }
    }
}

impl InputDefaults {
    /// A new sump reading with the planning fields pre-filled and the
    /// measured fields left blank for the engineer.
    pub fn draft_sump_reading(&self, site: &str, pit: &str, date: NaiveDate) -> RawSumpReading {
        RawSumpReading {
            date,
            site: site.to_string(),
            pit: pit.to_string(),
            elevation_m: None,
            critical_elevation_m: Some(self.critical_elevation_m),
            surveyed_volume_m3: None,
            rain_plan_mm: Some(self.rain_plan_mm),
            rain_actual_mm: None,
            catchment_ha: Some(self.catchment_ha),
            groundwater_m3: None,
            status: None,
        }
    }

    pub fn draft_pump_reading(
        &self,
        site: &str,
        pit: &str,
        unit_code: &str,
        date: NaiveDate,
    ) -> RawPumpReading {
        RawPumpReading {
            date,
            site: site.to_string(),
            pit: pit.to_string(),
            unit_code: unit_code.to_string(),
            discharge_plan_m3h: Some(self.discharge_plan_m3h),
            discharge_actual_m3h: None,
            ewh_plan_h: Some(self.ewh_plan_h),
            ewh_actual_h: None,
        }
    }
}

/// Root of sumps.toml.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SumpsConfig {
    #[serde(default)]
    pub thresholds: AlertThresholds,
    #[serde(default)]
    pub defaults: InputDefaults,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteLocation>,
}

impl SumpsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        if !(t.efficiency_floor > 0.0 && t.efficiency_floor <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "thresholds.efficiency_floor must be in (0, 1], got {}",
                t.efficiency_floor
            )));
        }
        if !(0.0..=HOURS_PER_DAY).contains(&self.defaults.ewh_plan_h) {
            return Err(ConfigError::Invalid(format!(
                "defaults.ewh_plan_h must be within 0-24 hours, got {}",
                self.defaults.ewh_plan_h
            )));
        }
        for site in &self.sites {
            if site.code.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "site '{}' has an empty code",
                    site.name
                )));
            }
        }
        Ok(())
    }

    pub fn find_site(&self, code: &str) -> Option<&SiteLocation> {
        self.sites.iter().find(|s| s.code == code)
    }

    /// Configured sites merged with the pits observed in readings.
    ///
    /// A configured site with no readings yet still appears (with its
    /// configured pits, possibly none).
    pub fn merged_site_map(&self, observed: &SiteMap) -> SiteMap {
        let mut merged = observed.clone();
        for site in &self.sites {
            let pits = merged.entry(site.code.clone()).or_default();
            for pit in &site.pits {
                if !pits.contains(pit) {
                    pits.push(pit.clone());
                }
            }
            pits.sort();
        }
        merged
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

pub fn parse_config(contents: &str) -> Result<SumpsConfig, ConfigError> {
    let config: SumpsConfig = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config_from(path: impl AsRef<Path>) -> Result<SumpsConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents)
}

/// Loads `sumps.toml` from the working directory.
pub fn load_config() -> Result<SumpsConfig, ConfigError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

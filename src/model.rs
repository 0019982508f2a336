/// Core data types for the sump water balance service.
///
/// This module defines the shared domain model imported by all other modules:
/// the raw reading shapes handed over by the Reading Store, the validated
/// readings the engine computes with, and the derived `WaterBalanceRecord`.
///
/// Validation lives here because it is the boundary between the loosely
/// populated collaborator data and the typed engine input. Everything else
/// is types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Hours in a reporting day; upper bound for equivalent working hours.
pub const HOURS_PER_DAY: f64 = 24.0;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Identifies one sump: (site, pit).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PitKey {
    pub site: String,
    pub pit: String,
}

impl PitKey {
    pub fn new(site: impl Into<String>, pit: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            pit: pit.into(),
        }
    }

    /// The reading key for this pit on `date`.
    pub fn on(&self, date: NaiveDate) -> ReadingKey {
        ReadingKey {
            site: self.site.clone(),
            pit: self.pit.clone(),
            date,
        }
    }
}

impl fmt::Display for PitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.site, self.pit)
    }
}

/// Identifies one reporting day of one sump: (site, pit, date).
///
/// Field order matters: the derived `Ord` sorts by site, then pit, then date,
/// which is exactly the chronological order within a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReadingKey {
    pub site: String,
    pub pit: String,
    pub date: NaiveDate,
}

impl ReadingKey {
    pub fn pit_key(&self) -> PitKey {
        PitKey::new(self.site.clone(), self.pit.clone())
    }
}

impl fmt::Display for ReadingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.site, self.pit, self.date)
    }
}

// ---------------------------------------------------------------------------
// Sites
// ---------------------------------------------------------------------------

/// A mine site and the pits configured for it.
///
/// Pits that only appear in readings are not listed here; see
/// `analysis::groupings::site_map` for the observed side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteLocation {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub pits: Vec<String>,
}

// ---------------------------------------------------------------------------
// Input-time status label
// ---------------------------------------------------------------------------

/// Status label assigned by the data entry form when a reading is saved.
///
/// Informational only: it goes stale whenever elevation or the critical
/// threshold is edited afterwards, so the engine always recomputes danger.
/// Legacy rows carry the Indonesian labels `BAHAYA` / `AMAN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputStatus {
    #[serde(alias = "BAHAYA", alias = "bahaya", alias = "DANGER")]
    Danger,
    #[serde(alias = "AMAN", alias = "aman", alias = "SAFE")]
    Safe,
}

impl InputStatus {
    /// The label the entry form would assign for this elevation.
    pub fn from_elevation(elevation_m: f64, critical_elevation_m: f64) -> Self {
        if elevation_m > critical_elevation_m {
            InputStatus::Danger
        } else {
            InputStatus::Safe
        }
    }

    /// Parses a stored label, accepting both English and legacy spellings.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "danger" | "bahaya" => Some(InputStatus::Danger),
            "safe" | "aman" => Some(InputStatus::Safe),
            _ => None,
        }
    }
}

impl fmt::Display for InputStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputStatus::Danger => write!(f, "DANGER"),
            InputStatus::Safe => write!(f, "SAFE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw readings (Reading Store boundary)
// ---------------------------------------------------------------------------

/// A sump reading as supplied by the Reading Store.
///
/// Numeric fields are optional because the store can hold blank cells
/// (edited grid rows, NULL columns). `validate` turns this into a
/// `SumpReading` or a per-record `MalformedReading` error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSumpReading {
    pub date: NaiveDate,
    pub site: String,
    pub pit: String,
    pub elevation_m: Option<f64>,
    pub critical_elevation_m: Option<f64>,
    pub surveyed_volume_m3: Option<f64>,
    pub rain_plan_mm: Option<f64>,
    pub rain_actual_mm: Option<f64>,
    pub catchment_ha: Option<f64>,
    pub groundwater_m3: Option<f64>,
    pub status: Option<InputStatus>,
}

/// A pump unit reading as supplied by the Reading Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPumpReading {
    pub date: NaiveDate,
    pub site: String,
    pub pit: String,
    pub unit_code: String,
    pub discharge_plan_m3h: Option<f64>,
    pub discharge_actual_m3h: Option<f64>,
    pub ewh_plan_h: Option<f64>,
    pub ewh_actual_h: Option<f64>,
}

/// Immutable snapshot of both reading collections for one computation pass.
///
/// The collaborator layer replaces its snapshot wholesale after every edit;
/// the engine never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingSnapshot {
    #[serde(default)]
    pub sump_readings: Vec<RawSumpReading>,
    #[serde(default)]
    pub pump_readings: Vec<RawPumpReading>,
}

impl ReadingSnapshot {
    pub fn new(sump_readings: Vec<RawSumpReading>, pump_readings: Vec<RawPumpReading>) -> Self {
        Self {
            sump_readings,
            pump_readings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sump_readings.is_empty() && self.pump_readings.is_empty()
    }

    /// Pump rows that pass validation, for display and efficiency scoring.
    /// Rejected rows surface as errors on their key in the balance report.
    pub fn valid_pump_readings(&self) -> Vec<PumpUnitReading> {
        self.pump_readings
            .iter()
            .filter_map(|raw| raw.validate().ok())
            .collect()
    }
}

impl RawSumpReading {
    pub fn key(&self) -> ReadingKey {
        ReadingKey {
            site: self.site.clone(),
            pit: self.pit.clone(),
            date: self.date,
        }
    }

    /// Checks field presence and ranges, producing the typed reading.
    pub fn validate(&self) -> Result<SumpReading, RecordError> {
        let key = self.key();

        let elevation_m = non_negative(&key, "elevation_m", self.elevation_m)?;
        let critical_elevation_m =
            non_negative(&key, "critical_elevation_m", self.critical_elevation_m)?;
        let surveyed_volume_m3 = non_negative(&key, "surveyed_volume_m3", self.surveyed_volume_m3)?;
        let rain_plan_mm = required(&key, "rain_plan_mm", self.rain_plan_mm)?;
        let rain_actual_mm = non_negative(&key, "rain_actual_mm", self.rain_actual_mm)?;
        let catchment_ha = non_negative(&key, "catchment_ha", self.catchment_ha)?;
        let groundwater_m3 = match self.groundwater_m3 {
            Some(_) => non_negative(&key, "groundwater_m3", self.groundwater_m3)?,
            None => 0.0,
        };

        Ok(SumpReading {
            date: self.date,
            site: self.site.clone(),
            pit: self.pit.clone(),
            elevation_m,
            critical_elevation_m,
            surveyed_volume_m3,
            rain_plan_mm,
            rain_actual_mm,
            catchment_ha,
            groundwater_m3,
            status: self.status,
        })
    }
}

impl RawPumpReading {
    pub fn key(&self) -> ReadingKey {
        ReadingKey {
            site: self.site.clone(),
            pit: self.pit.clone(),
            date: self.date,
        }
    }

    pub fn validate(&self) -> Result<PumpUnitReading, RecordError> {
        let key = self.key();

        if self.unit_code.trim().is_empty() {
            return Err(RecordError::malformed(&key, "unit_code", "is empty"));
        }

        Ok(PumpUnitReading {
            date: self.date,
            site: self.site.clone(),
            pit: self.pit.clone(),
            unit_code: self.unit_code.clone(),
            discharge_plan_m3h: non_negative(&key, "discharge_plan_m3h", self.discharge_plan_m3h)?,
            discharge_actual_m3h: non_negative(
                &key,
                "discharge_actual_m3h",
                self.discharge_actual_m3h,
            )?,
            ewh_plan_h: working_hours(&key, "ewh_plan_h", self.ewh_plan_h)?,
            ewh_actual_h: working_hours(&key, "ewh_actual_h", self.ewh_actual_h)?,
        })
    }
}

fn required(key: &ReadingKey, field: &'static str, value: Option<f64>) -> Result<f64, RecordError> {
    match value {
        None => Err(RecordError::malformed(key, field, "is missing")),
        Some(v) if !v.is_finite() => Err(RecordError::malformed(key, field, "is not a finite number")),
        Some(v) => Ok(v),
    }
}

fn non_negative(
    key: &ReadingKey,
    field: &'static str,
    value: Option<f64>,
) -> Result<f64, RecordError> {
    let v = required(key, field, value)?;
    if v < 0.0 {
        return Err(RecordError::malformed(key, field, format!("is negative ({v})")));
    }
    Ok(v)
}

fn working_hours(
    key: &ReadingKey,
    field: &'static str,
    value: Option<f64>,
) -> Result<f64, RecordError> {
    let v = non_negative(key, field, value)?;
    if v > HOURS_PER_DAY {
        return Err(RecordError::malformed(
            key,
            field,
            format!("exceeds {HOURS_PER_DAY} hours ({v})"),
        ));
    }
    Ok(v)
}

// ---------------------------------------------------------------------------
// Validated readings
// ---------------------------------------------------------------------------

/// One validated daily sump survey for a (site, pit, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumpReading {
    pub date: NaiveDate,
    pub site: String,
    pub pit: String,
    pub elevation_m: f64,
    pub critical_elevation_m: f64,
    /// Ground-truth volume from the survey.
    pub surveyed_volume_m3: f64,
    pub rain_plan_mm: f64,
    pub rain_actual_mm: f64,
    pub catchment_ha: f64,
    pub groundwater_m3: f64,
    pub status: Option<InputStatus>,
}

impl SumpReading {
    pub fn key(&self) -> ReadingKey {
        ReadingKey {
            site: self.site.clone(),
            pit: self.pit.clone(),
            date: self.date,
        }
    }

    pub fn pit_key(&self) -> PitKey {
        PitKey::new(self.site.clone(), self.pit.clone())
    }

    /// True when the stored input label no longer matches the elevation.
    pub fn label_is_stale(&self) -> bool {
        match self.status {
            Some(label) => {
                label != InputStatus::from_elevation(self.elevation_m, self.critical_elevation_m)
            }
            None => false,
        }
    }
}

/// One validated daily report for a single pump unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpUnitReading {
    pub date: NaiveDate,
    pub site: String,
    pub pit: String,
    pub unit_code: String,
    pub discharge_plan_m3h: f64,
    pub discharge_actual_m3h: f64,
    pub ewh_plan_h: f64,
    pub ewh_actual_h: f64,
}

impl PumpUnitReading {
    pub fn key(&self) -> ReadingKey {
        ReadingKey {
            site: self.site.clone(),
            pit: self.pit.clone(),
            date: self.date,
        }
    }
}

// ---------------------------------------------------------------------------
// Derived records
// ---------------------------------------------------------------------------

/// Why a record has no error percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    /// First reading of its group: there is no prior surveyed volume.
    FirstInGroup,
    /// Today's surveyed volume is zero, so the error cannot be normalised.
    ZeroSurveyedVolume,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndefinedReason::FirstInGroup => write!(f, "no prior data"),
            UndefinedReason::ZeroSurveyedVolume => write!(f, "zero surveyed volume"),
        }
    }
}

/// Water balance for one (site, pit, date) that has a sump reading.
///
/// `previous_volume_m3`, `theoretical_volume_m3` and `diff_m3` are `None`
/// for the first record of a group; `error_pct` is additionally `None` when
/// the surveyed volume is zero. `undefined_reason` says which.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterBalanceRecord {
    pub site: String,
    pub pit: String,
    pub date: NaiveDate,

    pub elevation_m: f64,
    pub critical_elevation_m: f64,
    pub surveyed_volume_m3: f64,
    pub rain_actual_mm: f64,
    pub catchment_ha: f64,

    pub inflow_rain_m3: f64,
    pub inflow_groundwater_m3: f64,
    pub outflow_m3: f64,

    pub previous_volume_m3: Option<f64>,
    pub theoretical_volume_m3: Option<f64>,
    pub diff_m3: Option<f64>,
    pub error_pct: Option<f64>,
    pub undefined_reason: Option<UndefinedReason>,

    pub elevation_danger: bool,
    pub balance_inconsistent: bool,

    /// Label stored at input time, carried through for display only.
    pub input_status: Option<InputStatus>,
}

impl WaterBalanceRecord {
    pub fn key(&self) -> ReadingKey {
        ReadingKey {
            site: self.site.clone(),
            pit: self.pit.clone(),
            date: self.date,
        }
    }

    pub fn total_inflow_m3(&self) -> f64 {
        self.inflow_rain_m3 + self.inflow_groundwater_m3
    }
}

/// Per-key outcome of a computation pass.
pub type BalanceOutcome = Result<WaterBalanceRecord, RecordError>;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Structural problems with a single (site, pit, date) key.
///
/// Never fatal to a pass: the affected key is reported and the rest of the
/// group is still reconciled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// A required field is absent or out of range.
    #[error("malformed reading {key}: {field} {reason}")]
    MalformedReading {
        key: ReadingKey,
        field: &'static str,
        reason: String,
    },
    /// More than one sump reading shares the key; none is treated as authoritative.
    #[error("ordering ambiguity at {key}: {count} sump readings share this date")]
    OrderingAmbiguity { key: ReadingKey, count: usize },
}

impl RecordError {
    fn malformed(key: &ReadingKey, field: &'static str, reason: impl Into<String>) -> Self {
        RecordError::MalformedReading {
            key: key.clone(),
            field,
            reason: reason.into(),
        }
    }

    pub fn key(&self) -> &ReadingKey {
        match self {
            RecordError::MalformedReading { key, .. } => key,
            RecordError::OrderingAmbiguity { key, .. } => key,
        }
    }
}

/// Site code → sorted pit names.
pub type SiteMap = BTreeMap<String, Vec<String>>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

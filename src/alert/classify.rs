/// Safety status and consistency classification.
///
/// Two independent signals are derived per water balance record:
///
/// - elevation danger: water above the critical elevation, recomputed from
///   the reading (the stored input label is never trusted);
/// - balance inconsistency: error percentage above tolerance, or no error
///   percentage at all.
///
/// `classify` composes them, together with pump efficiency, into a severity
/// and the full list of recommendations. Each day is classified on its own;
/// nothing here carries state across records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::analysis::balance::BalanceReport;
use crate::analysis::groupings::index_pump_readings;
use crate::model::{PumpUnitReading, ReadingKey, UndefinedReason, WaterBalanceRecord};

/// Largest error percentage still treated as a consistent balance.
pub const BALANCE_TOLERANCE_PCT: f64 = 5.0;

/// Fraction of planned discharge below which pumps need a mechanical check.
pub const PUMP_EFFICIENCY_FLOOR: f64 = 0.80;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Tunable alert limits, loaded from the `[thresholds]` table of
/// `sumps.toml`. The balance tolerance is fixed at `BALANCE_TOLERANCE_PCT`
/// and is not part of this table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertThresholds {
    pub efficiency_floor: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            efficiency_floor: PUMP_EFFICIENCY_FLOOR,
        }
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

pub fn is_elevation_danger(elevation_m: f64, critical_elevation_m: f64) -> bool {
    elevation_m > critical_elevation_m
}

/// Error above `BALANCE_TOLERANCE_PCT`. An undefined error percentage is
/// always inconsistent.
pub fn is_balance_inconsistent(error_pct: Option<f64>) -> bool {
    match error_pct {
        Some(pct) => pct > BALANCE_TOLERANCE_PCT,
        None => true,
    }
}

/// Which pump rows feed the efficiency score and pump tables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UnitSelection {
    #[default]
    All,
    Unit(String),
}

impl UnitSelection {
    pub fn matches(&self, unit_code: &str) -> bool {
        match self {
            UnitSelection::All => true,
            UnitSelection::Unit(code) => code == unit_code,
        }
    }

    pub fn select<'a>(&self, units: &'a [PumpUnitReading]) -> Vec<&'a PumpUnitReading> {
        units.iter().filter(|u| self.matches(&u.unit_code)).collect()
    }

    pub fn label(&self) -> &str {
        match self {
            UnitSelection::All => "All Units",
            UnitSelection::Unit(code) => code,
        }
    }
}

/// Σ actual rate / Σ planned rate over units with a positive plan.
///
/// `None` when no unit in scope has a plan to compare against.
pub fn pump_efficiency<'a, I>(units: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a PumpUnitReading>,
{
    let (actual, planned) = units
        .into_iter()
        .filter(|u| u.discharge_plan_m3h > 0.0)
        .fold((0.0, 0.0), |(a, p), u| {
            (a + u.discharge_actual_m3h, p + u.discharge_plan_m3h)
        });

    if planned > 0.0 {
        Some(actual / planned)
    } else {
        None
    }
}

/// Unit codes whose own actual/plan ratio is below `floor`.
pub fn underperforming_units<'a, I>(units: I, floor: f64) -> Vec<String>
where
    I: IntoIterator<Item = &'a PumpUnitReading>,
{
    let mut codes: Vec<String> = units
        .into_iter()
        .filter(|u| u.discharge_plan_m3h > 0.0)
        .filter(|u| u.discharge_actual_m3h / u.discharge_plan_m3h < floor)
        .map(|u| u.unit_code.clone())
        .collect();
    codes.sort();
    codes.dedup();
    codes
}

// ---------------------------------------------------------------------------
// Assessment
// ---------------------------------------------------------------------------

/// Severity in priority order; the first applicable one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    BalanceInconsistent,
    ElevationDanger,
    PumpUnderperforming,
    Nominal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    /// Re-check elevation, discharge and rainfall entries for the day.
    VerifyInputs {
        error_pct: Option<f64>,
        reason: Option<UndefinedReason>,
    },
    /// Surveyed water exceeds the prediction: look for unreported seepage.
    CheckSeepage {
        unexplained_m3: f64,
        recorded_groundwater_m3: f64,
    },
    /// Water above the critical elevation.
    StopAndEvacuate {
        elevation_m: f64,
        critical_elevation_m: f64,
    },
    /// Pumps delivering less than the efficiency floor of planned discharge.
    InspectPumps { efficiency: f64, units: Vec<String> },
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::VerifyInputs { error_pct, reason } => match (error_pct, reason) {
                (Some(pct), _) => write!(
                    f,
                    "Balance error {:.1}%: verify elevation, pump discharge and rainfall entries",
                    pct
                ),
                (None, Some(reason)) => write!(
                    f,
                    "Balance cannot be reconciled ({}): review the survey before relying on it",
                    reason
                ),
                (None, None) => write!(f, "Verify elevation, pump discharge and rainfall entries"),
            },
            Recommendation::CheckSeepage {
                unexplained_m3,
                recorded_groundwater_m3,
            } => write!(
                f,
                "{:.0} m³ unexplained above prediction (groundwater recorded: {:.0} m³): check for unreported seepage",
                unexplained_m3, recorded_groundwater_m3
            ),
            Recommendation::StopAndEvacuate {
                elevation_m,
                critical_elevation_m,
            } => write!(
                f,
                "Elevation {:.2} m exceeds critical {:.2} m: stop work in the pit and evacuate equipment",
                elevation_m, critical_elevation_m
            ),
            Recommendation::InspectPumps { efficiency, units } => {
                write!(
                    f,
                    "Pump efficiency {:.0}% of plan: schedule a mechanical check",
                    efficiency * 100.0
                )?;
                if !units.is_empty() {
                    write!(f, " ({})", units.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub severity: Severity,
    pub recommendations: Vec<Recommendation>,
    pub pump_efficiency: Option<f64>,
    pub error_pct: Option<f64>,
    pub undefined_reason: Option<UndefinedReason>,
}

impl Assessment {
    pub fn is_nominal(&self) -> bool {
        self.severity == Severity::Nominal
    }

    /// Short status text for tables, e.g. `inconsistent (no prior data)`.
    pub fn status_label(&self) -> String {
        match self.severity {
            Severity::BalanceInconsistent => match (self.undefined_reason, self.error_pct) {
                (Some(reason), _) => format!("inconsistent ({})", reason),
                (None, Some(pct)) => format!("inconsistent ({:.1}% error)", pct),
                (None, None) => "inconsistent".to_string(),
            },
            Severity::ElevationDanger => "danger (above critical elevation)".to_string(),
            Severity::PumpUnderperforming => "pump efficiency low".to_string(),
            Severity::Nominal => "nominal".to_string(),
        }
    }
}

/// Classifies one record. `units` are the pump rows in scope for the
/// efficiency score (already narrowed by any unit selection).
pub fn classify(
    record: &WaterBalanceRecord,
    units: &[&PumpUnitReading],
    thresholds: &AlertThresholds,
) -> Assessment {
    let mut recommendations = Vec::new();
    let mut severities = Vec::new();

    let inconsistent = is_balance_inconsistent(record.error_pct);
    if inconsistent {
        severities.push(Severity::BalanceInconsistent);
        recommendations.push(Recommendation::VerifyInputs {
            error_pct: record.error_pct,
            reason: record.undefined_reason,
        });
        if let Some(diff) = record.diff_m3 {
            if diff > 0.0 {
                recommendations.push(Recommendation::CheckSeepage {
                    unexplained_m3: diff,
                    recorded_groundwater_m3: record.inflow_groundwater_m3,
                });
            }
        }
    }

    if is_elevation_danger(record.elevation_m, record.critical_elevation_m) {
        severities.push(Severity::ElevationDanger);
        recommendations.push(Recommendation::StopAndEvacuate {
            elevation_m: record.elevation_m,
            critical_elevation_m: record.critical_elevation_m,
        });
    }

    let efficiency = pump_efficiency(units.iter().copied());
    if let Some(eff) = efficiency {
        if eff < thresholds.efficiency_floor {
            severities.push(Severity::PumpUnderperforming);
            recommendations.push(Recommendation::InspectPumps {
                efficiency: eff,
                units: underperforming_units(units.iter().copied(), thresholds.efficiency_floor),
            });
        }
    }

    Assessment {
        severity: severities.first().copied().unwrap_or(Severity::Nominal),
        recommendations,
        pump_efficiency: efficiency,
        error_pct: record.error_pct,
        undefined_reason: record.undefined_reason,
    }
}

/// Classifies every computed record in a report.
///
/// Pump rows are narrowed by `selection` for the efficiency score only;
/// the records' outflow already reflects every unit.
pub fn assess_report(
    report: &BalanceReport,
    pumps: &[PumpUnitReading],
    selection: &UnitSelection,
    thresholds: &AlertThresholds,
) -> BTreeMap<ReadingKey, Assessment> {
    let index = index_pump_readings(pumps);

    report
        .records()
        .map(|record| {
            let key = record.key();
            let units = index
                .get(&key)
                .map(|units| selection.select(units))
                .unwrap_or_default();
            let assessment = classify(record, &units, thresholds);
            (key, assessment)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Test fixtures: reading builders and a representative snapshot payload.
///
/// Builders default to a dry, quiet day: no rain, no groundwater, water
/// below the 13.0 m critical elevation, 25 ha catchment, pumps planned at
/// 500 m³/h for 20 h. Tests override only the fields they exercise.

use chrono::NaiveDate;

use crate::model::{
    InputStatus, PumpUnitReading, RawPumpReading, RawSumpReading, SumpReading, WaterBalanceRecord,
    UndefinedReason,
};

pub(crate) fn raw_sump(site: &str, pit: &str, date: NaiveDate, volume_m3: f64) -> RawSumpReading {
    RawSumpReading {
        date,
        site: site.to_string(),
        pit: pit.to_string(),
        elevation_m: Some(12.0),
        critical_elevation_m: Some(13.0),
        surveyed_volume_m3: Some(volume_m3),
        rain_plan_mm: Some(20.0),
        rain_actual_mm: Some(0.0),
        catchment_ha: Some(25.0),
        groundwater_m3: None,
        status: Some(InputStatus::Safe),
    }
}

pub(crate) fn sump(site: &str, pit: &str, date: NaiveDate, volume_m3: f64) -> SumpReading {
    raw_sump(site, pit, date, volume_m3)
        .validate()
        .expect("fixture reading should validate")
}

pub(crate) fn raw_pump(
    site: &str,
    pit: &str,
    unit_code: &str,
    date: NaiveDate,
    discharge_actual_m3h: f64,
    ewh_actual_h: f64,
) -> RawPumpReading {
    RawPumpReading {
        date,
        site: site.to_string(),
        pit: pit.to_string(),
        unit_code: unit_code.to_string(),
        discharge_plan_m3h: Some(500.0),
        discharge_actual_m3h: Some(discharge_actual_m3h),
        ewh_plan_h: Some(20.0),
        ewh_actual_h: Some(ewh_actual_h),
    }
}

pub(crate) fn pump(
    site: &str,
    pit: &str,
    unit_code: &str,
    date: NaiveDate,
    discharge_actual_m3h: f64,
    ewh_actual_h: f64,
) -> PumpUnitReading {
    raw_pump(site, pit, unit_code, date, discharge_actual_m3h, ewh_actual_h)
        .validate()
        .expect("fixture pump reading should validate")
}

/// A first-in-group record: nothing reconciled yet, elevation safe.
pub(crate) fn balance_record(site: &str, pit: &str, date: NaiveDate) -> WaterBalanceRecord {
    WaterBalanceRecord {
        site: site.to_string(),
        pit: pit.to_string(),
        date,
        elevation_m: 12.0,
        critical_elevation_m: 13.0,
        surveyed_volume_m3: 8_000.0,
        rain_actual_mm: 0.0,
        catchment_ha: 25.0,
        inflow_rain_m3: 0.0,
        inflow_groundwater_m3: 0.0,
        outflow_m3: 0.0,
        previous_volume_m3: None,
        theoretical_volume_m3: None,
        diff_m3: None,
        error_pct: None,
        undefined_reason: Some(UndefinedReason::FirstInGroup),
        elevation_danger: false,
        balance_inconsistent: true,
        input_status: Some(InputStatus::Safe),
    }
}

/// Two days at one sump with two pumps on day 2, plus a second site whose
/// only reading still carries the legacy `BAHAYA` label and a blank
/// groundwater cell. Day 2 at BTW/Sump Utara balances exactly.
pub(crate) fn fixture_snapshot_json() -> &'static str {
    r#"{
      "sump_readings": [
        {
          "date": "2025-01-01", "site": "BTW", "pit": "Sump Utara",
          "elevation_m": 11.8, "critical_elevation_m": 13.0,
          "surveyed_volume_m3": 10000.0,
          "rain_plan_mm": 20.0, "rain_actual_mm": 0.0,
          "catchment_ha": 25.0, "groundwater_m3": 0.0,
          "status": "AMAN"
        },
        {
          "date": "2025-01-02", "site": "BTW", "pit": "Sump Utara",
          "elevation_m": 12.1, "critical_elevation_m": 13.0,
          "surveyed_volume_m3": 9500.0,
          "rain_plan_mm": 20.0, "rain_actual_mm": 20.0,
          "catchment_ha": 25.0,
          "status": "AMAN"
        },
        {
          "date": "2025-01-02", "site": "KTB", "pit": "Pit 3",
          "elevation_m": 13.5, "critical_elevation_m": 13.0,
          "surveyed_volume_m3": 8000.0,
          "rain_plan_mm": 20.0, "rain_actual_mm": 0.0,
          "catchment_ha": 25.0, "groundwater_m3": null,
          "status": "BAHAYA"
        }
      ],
      "pump_readings": [
        {
          "date": "2025-01-02", "site": "BTW", "pit": "Sump Utara",
          "unit_code": "WP-01",
          "discharge_plan_m3h": 500.0, "discharge_actual_m3h": 400.0,
          "ewh_plan_h": 20.0, "ewh_actual_h": 10.0
        },
        {
          "date": "2025-01-02", "site": "BTW", "pit": "Sump Utara",
          "unit_code": "WP-02",
          "discharge_plan_m3h": 500.0, "discharge_actual_m3h": 300.0,
          "ewh_plan_h": 20.0, "ewh_actual_h": 5.0
        }
      ]
    }"#
}

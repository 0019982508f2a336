/// Water balance reconciliation.
///
/// For each (site, pit) group, walked in date order:
///
/// ```text
/// theoretical[i] = surveyed[i-1] + rain_inflow[i] + groundwater[i] - outflow[i]
/// diff[i]        = surveyed[i] - theoretical[i]
/// error_pct[i]   = |diff[i]| / surveyed[i] * 100
/// ```
///
/// The carry-forward base is the previous *surveyed* volume, so every day
/// re-anchors to ground truth and errors never accumulate along the series.
/// The first record of a group has no base and stays undefined; a zero
/// surveyed volume leaves only the error percentage undefined. Negative
/// theoretical volumes are kept as computed.
///
/// `compute_water_balance` runs a full pass over a snapshot: duplicate
/// detection on the raw rows, validation, grouping, outflow aggregation,
/// reconciliation.
/// It is a pure function of its inputs.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::alert::classify::{is_balance_inconsistent, is_elevation_danger};
use crate::analysis::groupings::{find_duplicate_keys, group_sump_readings, index_pump_readings};
use crate::analysis::inflow::{Inflow, inflow_for};
use crate::analysis::outflow::outflow_by_key;
use crate::model::{
    BalanceOutcome, PitKey, ReadingKey, ReadingSnapshot, RecordError, SumpReading,
    UndefinedReason, WaterBalanceRecord,
};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// All outcomes for one (site, pit), ordered by date.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBalance {
    pub key: PitKey,
    pub outcomes: Vec<BalanceOutcome>,
}

impl GroupBalance {
    pub fn records(&self) -> impl Iterator<Item = &WaterBalanceRecord> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    pub fn errors(&self) -> impl Iterator<Item = &RecordError> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    pub fn latest_record(&self) -> Option<&WaterBalanceRecord> {
        self.records().last()
    }
}

/// Result of one computation pass, groups ordered by (site, pit).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceReport {
    pub groups: Vec<GroupBalance>,
}

impl BalanceReport {
    pub fn group(&self, site: &str, pit: &str) -> Option<&GroupBalance> {
        self.groups
            .iter()
            .find(|g| g.key.site == site && g.key.pit == pit)
    }

    pub fn records(&self) -> impl Iterator<Item = &WaterBalanceRecord> {
        self.groups.iter().flat_map(|g| g.records())
    }

    pub fn errors(&self) -> impl Iterator<Item = &RecordError> {
        self.groups.iter().flat_map(|g| g.errors())
    }

    pub fn record_count(&self) -> usize {
        self.records().count()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Reconciles one day given the previous surveyed volume, if any.
pub fn reconcile_day(
    reading: &SumpReading,
    previous_volume_m3: Option<f64>,
    inflow: Inflow,
    outflow_m3: f64,
) -> WaterBalanceRecord {
    let theoretical =
        previous_volume_m3.map(|prev| prev + inflow.rain_m3 + inflow.groundwater_m3 - outflow_m3);
    let diff = theoretical.map(|t| reading.surveyed_volume_m3 - t);

    let (error_pct, undefined_reason) = match diff {
        None => (None, Some(UndefinedReason::FirstInGroup)),
        Some(_) if reading.surveyed_volume_m3 == 0.0 => {
            (None, Some(UndefinedReason::ZeroSurveyedVolume))
        }
        Some(d) => (Some(d.abs() / reading.surveyed_volume_m3 * 100.0), None),
    };

    WaterBalanceRecord {
        site: reading.site.clone(),
        pit: reading.pit.clone(),
        date: reading.date,
        elevation_m: reading.elevation_m,
        critical_elevation_m: reading.critical_elevation_m,
        surveyed_volume_m3: reading.surveyed_volume_m3,
        rain_actual_mm: reading.rain_actual_mm,
        catchment_ha: reading.catchment_ha,
        inflow_rain_m3: inflow.rain_m3,
        inflow_groundwater_m3: inflow.groundwater_m3,
        outflow_m3,
        previous_volume_m3,
        theoretical_volume_m3: theoretical,
        diff_m3: diff,
        error_pct,
        undefined_reason,
        elevation_danger: is_elevation_danger(reading.elevation_m, reading.critical_elevation_m),
        balance_inconsistent: is_balance_inconsistent(error_pct),
        input_status: reading.status,
    }
}

/// Carry-forward over one date-ordered group of valid readings.
///
/// The previous record in sort order is used regardless of calendar
/// distance; gaps are not detected. `outflow` entries missing for a key
/// mean no pumping that day.
pub fn reconcile_group(
    readings: &[SumpReading],
    outflow: &BTreeMap<ReadingKey, f64>,
) -> Vec<WaterBalanceRecord> {
    let mut records = Vec::with_capacity(readings.len());
    let mut previous_volume: Option<f64> = None;

    for reading in readings {
        let outflow_m3 = outflow.get(&reading.key()).copied().unwrap_or(0.0);
        records.push(reconcile_day(
            reading,
            previous_volume,
            inflow_for(reading),
            outflow_m3,
        ));
        previous_volume = Some(reading.surveyed_volume_m3);
    }

    records
}

// ---------------------------------------------------------------------------
// Full pass
// ---------------------------------------------------------------------------

/// Computes the water balance for every (site, pit) in the snapshot.
///
/// Keys that cannot be computed are reported in place as errors and left
/// out of the carry-forward chain:
/// - a key with more than one sump row, valid or not (none is trusted);
/// - a sump reading that fails validation;
/// - a key where any pump unit reading fails validation, since its outflow
///   would be partial. This error is reported even when the key has no
///   sump reading.
///
/// The next valid record carries forward from the last valid one, exactly
/// as across a missing day.
pub fn compute_water_balance(snapshot: &ReadingSnapshot) -> BalanceReport {
    let mut failures: BTreeMap<PitKey, Vec<RecordError>> = BTreeMap::new();

    let duplicates = find_duplicate_keys(&snapshot.sump_readings);
    for (key, count) in &duplicates {
        warn!(%key, count, "duplicate sump readings, key not reconciled");
        failures
            .entry(key.pit_key())
            .or_default()
            .push(RecordError::OrderingAmbiguity {
                key: key.clone(),
                count: *count,
            });
    }

    let mut sump_readings = Vec::with_capacity(snapshot.sump_readings.len());
    for raw in &snapshot.sump_readings {
        if duplicates.contains_key(&raw.key()) {
            continue;
        }
        match raw.validate() {
            Ok(reading) => sump_readings.push(reading),
            Err(e) => {
                warn!(key = %e.key(), error = %e, "rejected sump reading");
                failures.entry(e.key().pit_key()).or_default().push(e);
            }
        }
    }

    let mut pump_readings = Vec::with_capacity(snapshot.pump_readings.len());
    let mut failed_pump_keys: BTreeSet<ReadingKey> = BTreeSet::new();
    for raw in &snapshot.pump_readings {
        match raw.validate() {
            Ok(reading) => pump_readings.push(reading),
            Err(e) => {
                warn!(key = %e.key(), error = %e, "rejected pump reading");
                if failed_pump_keys.insert(e.key().clone()) {
                    failures.entry(e.key().pit_key()).or_default().push(e);
                }
            }
        }
    }

    let outflow = outflow_by_key(&index_pump_readings(&pump_readings));
    let grouped = group_sump_readings(&sump_readings);

    let pit_keys: BTreeSet<PitKey> = grouped
        .keys()
        .chain(failures.keys())
        .cloned()
        .collect();

    let mut groups = Vec::with_capacity(pit_keys.len());
    for pit_key in pit_keys {
        let readings = grouped.get(&pit_key).map(Vec::as_slice).unwrap_or(&[]);
        let errors = failures.remove(&pit_key).unwrap_or_default();

        let usable: Vec<SumpReading> = readings
            .iter()
            .filter(|r| !failed_pump_keys.contains(&r.key()))
            .cloned()
            .collect();

        let records = reconcile_group(&usable, &outflow);
        debug!(
            pit = %pit_key,
            records = records.len(),
            errors = errors.len(),
            "reconciled group"
        );

        let mut outcomes: Vec<BalanceOutcome> = records
            .into_iter()
            .map(Ok)
            .chain(errors.into_iter().map(Err))
            .collect();
        outcomes.sort_by_key(outcome_date);

        groups.push(GroupBalance {
            key: pit_key,
            outcomes,
        });
    }

    BalanceReport { groups }
}

fn outcome_date(outcome: &BalanceOutcome) -> chrono::NaiveDate {
    match outcome {
        Ok(record) => record.date,
        Err(e) => e.key().date,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::{raw_pump, raw_sump, sump};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[test]
    fn test_first_record_has_no_theoretical_volume() {
        let readings = vec![sump("BTW", "North", d(1), 8_000.0)];
        let records = reconcile_group(&readings, &BTreeMap::new());

        let first = &records[0];
        assert_eq!(first.previous_volume_m3, None);
        assert_eq!(first.theoretical_volume_m3, None);
        assert_eq!(first.diff_m3, None);
        assert_eq!(first.error_pct, None);
        assert_eq!(first.undefined_reason, Some(UndefinedReason::FirstInGroup));
        assert!(first.balance_inconsistent);
    }

    #[test]
    fn test_carry_forward_uses_previous_surveyed_volume() {
        // Day 2 is off by 1000 m³; day 3 must re-anchor on day 2's survey,
        // not on day 2's theoretical volume.
        let readings = vec![
            sump("BTW", "North", d(1), 10_000.0),
            sump("BTW", "North", d(2), 11_000.0),
            sump("BTW", "North", d(3), 11_000.0),
        ];
        let records = reconcile_group(&readings, &BTreeMap::new());

        assert_eq!(records[1].theoretical_volume_m3, Some(10_000.0));
        assert_eq!(records[1].diff_m3, Some(1_000.0));
        assert_eq!(records[2].previous_volume_m3, Some(11_000.0));
        assert_eq!(records[2].theoretical_volume_m3, Some(11_000.0));
        assert_eq!(records[2].error_pct, Some(0.0));
        assert!(!records[2].balance_inconsistent);
    }

    #[test]
    fn test_zero_surveyed_volume_leaves_error_undefined() {
        let readings = vec![
            sump("BTW", "North", d(1), 500.0),
            sump("BTW", "North", d(2), 0.0),
        ];
        let records = reconcile_group(&readings, &BTreeMap::new());

        let day2 = &records[1];
        assert_eq!(day2.theoretical_volume_m3, Some(500.0));
        assert_eq!(day2.diff_m3, Some(-500.0));
        assert_eq!(day2.error_pct, None);
        assert_eq!(day2.undefined_reason, Some(UndefinedReason::ZeroSurveyedVolume));
        assert!(day2.balance_inconsistent);
    }

    #[test]
    fn test_negative_theoretical_volume_is_not_clamped() {
        let readings = vec![
            sump("BTW", "North", d(1), 1_000.0),
            sump("BTW", "North", d(2), 200.0),
        ];
        let mut outflow = BTreeMap::new();
        outflow.insert(PitKey::new("BTW", "North").on(d(2)), 3_000.0);

        let records = reconcile_group(&readings, &outflow);
        assert_eq!(records[1].theoretical_volume_m3, Some(-2_000.0));
        assert_eq!(records[1].diff_m3, Some(2_200.0));
        assert_eq!(records[1].error_pct, Some(1_100.0));
    }

    #[test]
    fn test_compute_scenario_b_two_pumps_consistent() {
        let mut day2 = raw_sump("BTW", "North", d(2), 9_500.0);
        day2.rain_actual_mm = Some(20.0);
        day2.catchment_ha = Some(25.0);

        let snapshot = ReadingSnapshot::new(
            vec![raw_sump("BTW", "North", d(1), 10_000.0), day2],
            vec![
                raw_pump("BTW", "North", "WP-01", d(2), 400.0, 10.0),
                raw_pump("BTW", "North", "WP-02", d(2), 300.0, 5.0),
            ],
        );

        let report = compute_water_balance(&snapshot);
        let group = report.group("BTW", "North").expect("group should exist");
        let records: Vec<_> = group.records().collect();

        assert_eq!(records.len(), 2);
        let r = records[1];
        assert_eq!(r.inflow_rain_m3, 5_000.0);
        assert_eq!(r.outflow_m3, 5_500.0);
        assert_eq!(r.theoretical_volume_m3, Some(9_500.0));
        assert_eq!(r.diff_m3, Some(0.0));
        assert_eq!(r.error_pct, Some(0.0));
        assert!(!r.balance_inconsistent);
    }

    #[test]
    fn test_malformed_reading_is_local_and_skipped_in_chain() {
        let mut broken = raw_sump("BTW", "North", d(2), 9_000.0);
        broken.elevation_m = None;

        let snapshot = ReadingSnapshot::new(
            vec![
                raw_sump("BTW", "North", d(1), 10_000.0),
                broken,
                raw_sump("BTW", "North", d(3), 10_000.0),
                raw_sump("BTW", "South", d(1), 3_000.0),
            ],
            vec![],
        );

        let report = compute_water_balance(&snapshot);
        let north = report.group("BTW", "North").unwrap();

        assert_eq!(north.outcomes.len(), 3);
        assert!(north.outcomes[0].is_ok());
        assert!(matches!(
            &north.outcomes[1],
            Err(RecordError::MalformedReading { field: "elevation_m", .. })
        ));
        let day3 = north.outcomes[2].as_ref().unwrap();
        assert_eq!(day3.previous_volume_m3, Some(10_000.0), "bridges over the bad day");

        assert_eq!(report.group("BTW", "South").unwrap().records().count(), 1);
    }

    #[test]
    fn test_duplicate_dates_are_flagged_not_guessed() {
        let snapshot = ReadingSnapshot::new(
            vec![
                raw_sump("BTW", "North", d(1), 10_000.0),
                raw_sump("BTW", "North", d(2), 9_000.0),
                raw_sump("BTW", "North", d(2), 9_900.0),
                raw_sump("BTW", "North", d(3), 10_000.0),
            ],
            vec![],
        );

        let report = compute_water_balance(&snapshot);
        let north = report.group("BTW", "North").unwrap();
        let errors: Vec<_> = north.errors().collect();

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], RecordError::OrderingAmbiguity { count: 2, .. }));

        let day3 = north.records().find(|r| r.date == d(3)).unwrap();
        assert_eq!(day3.previous_volume_m3, Some(10_000.0));
    }

    #[test]
    fn test_duplicate_with_malformed_row_is_still_ambiguous() {
        let mut broken = raw_sump("BTW", "North", d(2), 9_000.0);
        broken.elevation_m = None;

        let snapshot = ReadingSnapshot::new(
            vec![
                raw_sump("BTW", "North", d(1), 10_000.0),
                raw_sump("BTW", "North", d(2), 9_900.0),
                broken,
                raw_sump("BTW", "North", d(3), 10_000.0),
            ],
            vec![],
        );

        let report = compute_water_balance(&snapshot);
        let north = report.group("BTW", "North").unwrap();
        let errors: Vec<_> = north.errors().collect();

        assert_eq!(errors.len(), 1, "one error for the key, got {:?}", errors);
        assert!(matches!(
            errors[0],
            RecordError::OrderingAmbiguity { count: 2, key } if key.date == d(2)
        ));
        assert!(
            north.records().all(|r| r.date != d(2)),
            "the valid duplicate must not be reconciled"
        );

        let day3 = north.records().find(|r| r.date == d(3)).unwrap();
        assert_eq!(day3.previous_volume_m3, Some(10_000.0), "day 2 not used as base");
    }

    #[test]
    fn test_malformed_pump_reading_fails_only_its_key() {
        let mut bad_pump = raw_pump("BTW", "North", "WP-02", d(2), 300.0, 5.0);
        bad_pump.ewh_actual_h = None;

        let snapshot = ReadingSnapshot::new(
            vec![
                raw_sump("BTW", "North", d(1), 10_000.0),
                raw_sump("BTW", "North", d(2), 9_000.0),
                raw_sump("BTW", "North", d(3), 9_000.0),
            ],
            vec![raw_pump("BTW", "North", "WP-01", d(2), 400.0, 10.0), bad_pump],
        );

        let report = compute_water_balance(&snapshot);
        let north = report.group("BTW", "North").unwrap();

        assert!(north.outcomes[1].is_err(), "day 2 outflow would be partial");
        let day3 = north.outcomes[2].as_ref().unwrap();
        assert_eq!(day3.previous_volume_m3, Some(10_000.0));
    }

    #[test]
    fn test_group_with_only_malformed_readings_still_reported() {
        let mut broken = raw_sump("BTW", "West", d(1), 1_000.0);
        broken.surveyed_volume_m3 = None;

        let report = compute_water_balance(&ReadingSnapshot::new(vec![broken], vec![]));
        let west = report.group("BTW", "West").expect("group should be present");
        assert_eq!(west.records().count(), 0);
        assert_eq!(west.errors().count(), 1);
    }

    #[test]
    fn test_malformed_pump_reading_without_sump_reading_is_reported() {
        let mut bad_pump = raw_pump("BTW", "North", "WP-01", d(5), 400.0, 10.0);
        bad_pump.discharge_actual_m3h = None;

        let snapshot = ReadingSnapshot::new(
            vec![raw_sump("BTW", "North", d(1), 10_000.0)],
            vec![bad_pump],
        );
        let report = compute_water_balance(&snapshot);
        let north = report.group("BTW", "North").unwrap();

        assert_eq!(north.records().count(), 1);
        let errors: Vec<_> = north.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            RecordError::MalformedReading { field: "discharge_actual_m3h", key, .. } if key.date == d(5)
        ));
    }

    #[test]
    fn test_malformed_pump_reading_on_unknown_pit_gets_its_own_group() {
        let mut bad_pump = raw_pump("BTW", "East", "WP-09", d(2), 400.0, 10.0);
        bad_pump.ewh_actual_h = Some(30.0);

        let report = compute_water_balance(&ReadingSnapshot::new(vec![], vec![bad_pump]));
        let east = report.group("BTW", "East").expect("group for the pump's pit");
        assert_eq!(east.records().count(), 0);
        assert_eq!(east.errors().count(), 1);
    }

    #[test]
    fn test_pumps_without_sump_reading_produce_no_record() {
        let snapshot = ReadingSnapshot::new(
            vec![raw_sump("BTW", "North", d(1), 10_000.0)],
            vec![raw_pump("BTW", "North", "WP-01", d(5), 400.0, 10.0)],
        );
        let report = compute_water_balance(&snapshot);
        assert_eq!(report.record_count(), 1);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let snapshot = ReadingSnapshot::new(
            vec![
                raw_sump("BTW", "South", d(2), 3_100.0),
                raw_sump("BTW", "North", d(2), 9_000.0),
                raw_sump("BTW", "North", d(1), 10_000.0),
                raw_sump("BTW", "South", d(1), 3_000.0),
            ],
            vec![raw_pump("BTW", "North", "WP-01", d(2), 100.0, 10.0)],
        );

        let first = compute_water_balance(&snapshot);
        let second = compute_water_balance(&snapshot);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_snapshot_gives_empty_report() {
        let report = compute_water_balance(&ReadingSnapshot::default());
        assert!(report.is_empty());
    }
}

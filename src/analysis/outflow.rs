/// Outflow aggregation across pump units.
///
/// The daily outflow of a sump is the volume removed by every unit that
/// reported for that (site, pit, date). Unit filters chosen for display
/// never reach this module: reconciliation always sees total withdrawal.

use std::collections::BTreeMap;

use crate::model::{PumpUnitReading, ReadingKey};

/// Volume removed by one unit in a day: actual rate × actual working hours.
pub fn unit_volume(reading: &PumpUnitReading) -> f64 {
    reading.discharge_actual_m3h * reading.ewh_actual_h
}

/// Total volume removed by all units in `units`. No units ⇒ 0.
pub fn aggregate_outflow(units: &[PumpUnitReading]) -> f64 {
    units.iter().map(unit_volume).sum()
}

/// Outflow per (site, pit, date) for an indexed pump collection.
///
/// Keys absent from the index have no pumping; callers treat a missing
/// entry as 0, not as missing data.
pub fn outflow_by_key(
    index: &BTreeMap<ReadingKey, Vec<PumpUnitReading>>,
) -> BTreeMap<ReadingKey, f64> {
    index
        .iter()
        .map(|(key, units)| (key.clone(), aggregate_outflow(units)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::groupings::index_pump_readings;
    use crate::ingest::fixtures::pump;
    use crate::model::PitKey;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[test]
    fn test_aggregate_outflow_sums_rate_times_hours() {
        let units = vec![
            pump("BTW", "North", "WP-01", d(2), 400.0, 10.0),
            pump("BTW", "North", "WP-02", d(2), 300.0, 5.0),
        ];
        assert_eq!(aggregate_outflow(&units), 5_500.0);
    }

    #[test]
    fn test_aggregate_outflow_no_units_is_zero() {
        assert_eq!(aggregate_outflow(&[]), 0.0);
    }

    #[test]
    fn test_zero_discharge_unit_does_not_change_total() {
        let mut units = vec![
            pump("BTW", "North", "WP-01", d(2), 400.0, 10.0),
            pump("BTW", "North", "WP-02", d(2), 300.0, 5.0),
        ];
        let before = aggregate_outflow(&units);

        units.push(pump("BTW", "North", "WP-03", d(2), 0.0, 12.0));
        assert_eq!(aggregate_outflow(&units), before);
    }

    #[test]
    fn test_aggregate_outflow_is_order_independent() {
        let a = pump("BTW", "North", "WP-01", d(2), 410.5, 9.25);
        let b = pump("BTW", "North", "WP-02", d(2), 287.0, 5.5);
        let c = pump("BTW", "North", "WP-03", d(2), 120.0, 23.0);

        let forward = aggregate_outflow(&[a.clone(), b.clone(), c.clone()]);
        let reversed = aggregate_outflow(&[c, b, a]);
        assert!((forward - reversed).abs() < 1e-9);
    }

    #[test]
    fn test_outflow_by_key_covers_each_day() {
        let index = index_pump_readings(&[
            pump("BTW", "North", "WP-01", d(2), 400.0, 10.0),
            pump("BTW", "North", "WP-01", d(3), 400.0, 2.0),
        ]);
        let outflow = outflow_by_key(&index);

        let north = PitKey::new("BTW", "North");
        assert_eq!(outflow[&north.on(d(2))], 4_000.0);
        assert_eq!(outflow[&north.on(d(3))], 800.0);
        assert!(!outflow.contains_key(&north.on(d(4))));
    }
}

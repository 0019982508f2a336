/// Grouping and ordering of flat reading collections.
///
/// `group_sump_readings` partitions the validated sump readings by
/// (site, pit) and sorts each partition chronologically; that ordering is
/// what the carry-forward reconciliation walks. Pump readings are indexed by
/// the full (site, pit, date) key so the outflow aggregator can look up every
/// unit that reported on a given day.
///
/// All maps are `BTreeMap`s so that every pass over the same snapshot
/// visits groups in the same order.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{PitKey, PumpUnitReading, RawSumpReading, ReadingKey, SiteMap, SumpReading};

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Groups sump readings by (site, pit), each group sorted by date ascending.
///
/// The sort is stable, so readings that share a date keep their input order.
/// Ties are not resolved here; see `find_duplicate_keys`.
pub fn group_sump_readings(readings: &[SumpReading]) -> BTreeMap<PitKey, Vec<SumpReading>> {
    let mut grouped: BTreeMap<PitKey, Vec<SumpReading>> = BTreeMap::new();

    for reading in readings {
        grouped
            .entry(reading.pit_key())
            .or_default()
            .push(reading.clone());
    }

    for group in grouped.values_mut() {
        group.sort_by_key(|r| r.date);
    }

    grouped
}

/// Indexes pump readings by (site, pit, date). Every unit reporting for a key
/// is kept, in input order.
pub fn index_pump_readings(
    readings: &[PumpUnitReading],
) -> BTreeMap<ReadingKey, Vec<PumpUnitReading>> {
    let mut index: BTreeMap<ReadingKey, Vec<PumpUnitReading>> = BTreeMap::new();

    for reading in readings {
        index.entry(reading.key()).or_default().push(reading.clone());
    }

    index
}

/// Keys with more than one raw sump reading, with their row counts.
///
/// Runs on raw readings so that a row failing validation still counts: if
/// one of two rows for a day is malformed, the other is not authoritative
/// either.
pub fn find_duplicate_keys(readings: &[RawSumpReading]) -> BTreeMap<ReadingKey, usize> {
    let mut counts: BTreeMap<ReadingKey, usize> = BTreeMap::new();

    for reading in readings {
        *counts.entry(reading.key()).or_default() += 1;
    }

    counts.retain(|_, count| *count > 1);
    counts
}

/// Builds the site → pits map from the sump table.
///
/// Uses raw readings: a pit exists as soon as any reading references it,
/// even one that later fails validation.
pub fn site_map(readings: &[RawSumpReading]) -> SiteMap {
    let mut sites: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for reading in readings {
        sites
            .entry(reading.site.clone())
            .or_default()
            .insert(reading.pit.clone());
    }

    sites
        .into_iter()
        .map(|(site, pits)| (site, pits.into_iter().collect()))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

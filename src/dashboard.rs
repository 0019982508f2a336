/// Period view over a computed report: one site, one or all sumps, one
/// month, and the pump rows that go with it.
///
/// This is what the trend tables and charts render. The unit selection only
/// narrows the pump rows shown (and the efficiency score); the records'
/// outflow always reflects every unit.

use chrono::Datelike;
use serde::Serialize;

use crate::alert::classify::UnitSelection;
use crate::analysis::balance::BalanceReport;
use crate::model::{InputStatus, PumpUnitReading, WaterBalanceRecord};

/// Indonesian month labels used on the site dashboards.
const MONTH_NAMES: [&str; 12] = [
    "Januari", "Februari", "Maret", "April", "Mei", "Juni", "Juli", "Agustus", "September",
    "Oktober", "November", "Desember",
];

pub fn month_name(month: u32) -> Option<&'static str> {
    MONTH_NAMES.get(month.checked_sub(1)? as usize).copied()
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PitSelection {
    #[default]
    All,
    Pit(String),
}

impl PitSelection {
    pub fn matches(&self, pit: &str) -> bool {
        match self {
            PitSelection::All => true,
            PitSelection::Pit(name) => name == pit,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PitSelection::All => "All Sumps",
            PitSelection::Pit(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardQuery {
    pub site: String,
    pub pit: PitSelection,
    pub unit: UnitSelection,
    pub year: i32,
    pub month: u32,
}

impl DashboardQuery {
    fn in_period(&self, date: chrono::NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    /// Records for the selected sump(s) in the month, ordered by (date, pit).
    pub records: Vec<WaterBalanceRecord>,
    /// Pump rows for the selected sump(s), unit and month.
    pub pump_rows: Vec<PumpUnitReading>,
    pub title_suffix: String,
}

/// Headline figures for the latest day in a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub date: chrono::NaiveDate,
    pub pit: String,
    pub elevation_m: f64,
    pub critical_elevation_m: f64,
    pub surveyed_volume_m3: f64,
    pub rain_today_mm: f64,
    pub rain_month_to_date_mm: f64,
    pub status: InputStatus,
}

pub fn build_view(
    report: &BalanceReport,
    pumps: &[PumpUnitReading],
    query: &DashboardQuery,
) -> DashboardView {
    let mut records: Vec<WaterBalanceRecord> = report
        .records()
        .filter(|r| r.site == query.site && query.pit.matches(&r.pit) && query.in_period(r.date))
        .cloned()
        .collect();
    records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.pit.cmp(&b.pit)));

    let mut pump_rows: Vec<PumpUnitReading> = pumps
        .iter()
        .filter(|p| {
            p.site == query.site
                && query.pit.matches(&p.pit)
                && query.unit.matches(&p.unit_code)
                && query.in_period(p.date)
        })
        .cloned()
        .collect();
    pump_rows.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.pit.cmp(&b.pit))
            .then_with(|| a.unit_code.cmp(&b.unit_code))
    });

    let title_suffix = format!(
        "{} - {} ({} {})",
        query.pit.label(),
        query.unit.label(),
        month_name(query.month).unwrap_or("?"),
        query.year
    );

    DashboardView {
        records,
        pump_rows,
        title_suffix,
    }
}

impl DashboardView {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Summary of the last record in the view; `None` for an empty view.
    ///
    /// Month-to-date rain sums every record in the view, so with
    /// "All Sumps" it adds up rainfall across the site's pits.
    pub fn summary(&self) -> Option<DashboardSummary> {
        let last = self.records.last()?;
        Some(DashboardSummary {
            date: last.date,
            pit: last.pit.clone(),
            elevation_m: last.elevation_m,
            critical_elevation_m: last.critical_elevation_m,
            surveyed_volume_m3: last.surveyed_volume_m3,
            rain_today_mm: last.rain_actual_mm,
            rain_month_to_date_mm: self.records.iter().map(|r| r.rain_actual_mm).sum(),
            status: InputStatus::from_elevation(last.elevation_m, last.critical_elevation_m),
        })
    }
}

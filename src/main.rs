//! Sump Water Balance Service - report runner
//!
//! Loads one snapshot of sump and pump readings, reconciles the water
//! balance for every (site, pit), and prints the period view for one site:
//! headline figures, the daily balance table, pump rows, per-day errors and
//! recommendations.
//!
//! Usage:
//!   cargo run --release -- --snapshot data/sample_snapshot.json
//!   cargo run --release -- --site BTW --pit "Sump Utara" --year 2025 --month 1
//!   cargo run --release -- --snapshot data/sample_snapshot.json --json
//!   cargo run --release -- --endpoint 8080       # serve live readings over HTTP
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string (when no --snapshot is given)
//!   SUMPMON_LOG  - tracing filter, e.g. `sumpmon_service=debug`

use chrono::Datelike;
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use sumpmon_service::alert::classify::{Assessment, UnitSelection, assess_report};
use sumpmon_service::analysis::balance::compute_water_balance;
use sumpmon_service::analysis::groupings;
use sumpmon_service::config::{self, DEFAULT_CONFIG_PATH, SumpsConfig};
use sumpmon_service::dashboard::{
    DashboardQuery, DashboardSummary, DashboardView, PitSelection, build_view,
};
use sumpmon_service::endpoint::{self, EndpointState, SnapshotSource};
use sumpmon_service::ingest::snapshot;
use sumpmon_service::model::{ReadingSnapshot, RecordError};
use sumpmon_service::{db, logging};

#[derive(Debug, Parser)]
#[command(name = "sumpmon", version, about = "Water balance reconciliation for dewatering sumps")]
struct Cli {
    /// Config file (thresholds, entry defaults, site registry)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read readings from a JSON snapshot instead of the database
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Site code; defaults to the first known site
    #[arg(long)]
    site: Option<String>,

    /// Pit name; all pits of the site when omitted
    #[arg(long)]
    pit: Option<String>,

    /// Pump unit code; all units when omitted
    #[arg(long)]
    unit: Option<String>,

    /// Report year; defaults to the current year
    #[arg(long)]
    year: Option<i32>,

    /// Report month (1-12); defaults to the current month
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    month: Option<u32>,

    /// Print the view as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Serve the readings over HTTP on this port after printing the report;
    /// readings are re-read for every request
    #[arg(long, value_name = "PORT")]
    endpoint: Option<u16>,

    /// Debug-level logging (SUMPMON_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    view: &'a DashboardView,
    summary: Option<DashboardSummary>,
    assessments: Vec<&'a Assessment>,
    errors: Vec<String>,
}

fn load_config(path: Option<&Path>) -> Result<SumpsConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config_from(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => config::load_config(),
        None => {
            info!("no {} found, using built-in defaults", DEFAULT_CONFIG_PATH);
            Ok(SumpsConfig::default())
        }
    }
}

fn load_readings(path: Option<&Path>) -> Result<ReadingSnapshot, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(snapshot::load_snapshot(path)?),
        None => {
            let mut client = db::connect_and_verify()?;
            Ok(db::load_snapshot(&mut client)?)
        }
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Re-reads the same source the report was loaded from.
fn snapshot_source(path: Option<&Path>) -> Result<SnapshotSource, db::DbError> {
    match path {
        Some(path) => {
            let path = path.to_path_buf();
            Ok(Box::new(move || -> Result<ReadingSnapshot, BoxError> {
                Ok(snapshot::load_snapshot(&path)?)
            }))
        }
        None => {
            let mut client = db::connect_and_verify()?;
            Ok(Box::new(move || -> Result<ReadingSnapshot, BoxError> {
                Ok(db::load_snapshot(&mut client)?)
            }))
        }
    }
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("\n❌ {}: {}\n", context, err);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("failed to initialise logging: {}", e);
    }

    let config = load_config(cli.config.as_deref()).unwrap_or_else(|e| fail("Config error", e));
    let readings =
        load_readings(cli.snapshot.as_deref()).unwrap_or_else(|e| fail("Failed to load readings", e));
    let thresholds = config.thresholds;
    let report = compute_water_balance(&readings);

    let site_map = config.merged_site_map(&groupings::site_map(&readings.sump_readings));
    let Some(site) = cli.site.clone().or_else(|| site_map.keys().next().cloned()) else {
        fail("No sites", "no readings and no [[site]] entries in the config");
    };
    if !site_map.contains_key(&site) {
        warn!(%site, "site has no readings and is not configured");
    }

    let today = chrono::Local::now().date_naive();
    let unit = cli.unit.clone().map_or(UnitSelection::All, UnitSelection::Unit);
    let query = DashboardQuery {
        site: site.clone(),
        pit: cli.pit.clone().map_or(PitSelection::All, PitSelection::Pit),
        unit: unit.clone(),
        year: cli.year.unwrap_or(today.year()),
        month: cli.month.unwrap_or(today.month()),
    };

    let pumps = readings.valid_pump_readings();
    let view = build_view(&report, &pumps, &query);
    let assessments = assess_report(&report, &pumps, &unit, &thresholds);
    let errors: Vec<&RecordError> = report
        .errors()
        .filter(|e| {
            let key = e.key();
            key.site == query.site
                && query.pit.matches(&key.pit)
                && key.date.year() == query.year
                && key.date.month() == query.month
        })
        .collect();

    if cli.json {
        let json = JsonReport {
            view: &view,
            summary: view.summary(),
            assessments: view
                .records
                .iter()
                .filter_map(|r| assessments.get(&r.key()))
                .collect(),
            errors: errors.iter().map(|e| e.to_string()).collect(),
        };
        match serde_json::to_string_pretty(&json) {
            Ok(text) => println!("{}", text),
            Err(e) => fail("Failed to serialise report", e),
        }
    } else {
        let site_name = config
            .find_site(&site)
            .map(|s| s.name.as_str())
            .unwrap_or(site.as_str());
        println!("💧 Water Balance: {} | {}", site_name, view.title_suffix);
        println!("============================================================\n");

        match view.summary() {
            Some(s) => {
                println!("📊 Latest ({} {})", s.date, s.pit);
                println!("   Elevation:        {:.2} m (critical {:.2} m)", s.elevation_m, s.critical_elevation_m);
                println!("   Surveyed volume:  {:.0} m³", s.surveyed_volume_m3);
                println!("   Rain today / MTD: {:.1} / {:.1} mm", s.rain_today_mm, s.rain_month_to_date_mm);
                println!("   Status:           {}\n", s.status);
            }
            None => println!("📭 No records for this period\n"),
        }

        if !view.records.is_empty() {
            println!("📅 Daily balance");
            for record in &view.records {
                let error = record
                    .error_pct
                    .map(|pct| format!("{:6.1}%", pct))
                    .unwrap_or_else(|| "    n/a".to_string());
                let status = assessments
                    .get(&record.key())
                    .map(|a| a.status_label())
                    .unwrap_or_default();
                println!(
                    "   {} {:<14} surveyed {:>9.0}  theoretical {:>9}  error {}  {}",
                    record.date,
                    record.pit,
                    record.surveyed_volume_m3,
                    record
                        .theoretical_volume_m3
                        .map(|v| format!("{:.0}", v))
                        .unwrap_or_else(|| "n/a".to_string()),
                    error,
                    status
                );
            }
            println!();
        }

        if !view.pump_rows.is_empty() {
            println!("⚙️  Pumps");
            for p in &view.pump_rows {
                println!(
                    "   {} {:<14} {:<8} {:>6.0} m³/h x {:>4.1} h (plan {:.0} x {:.1})",
                    p.date,
                    p.pit,
                    p.unit_code,
                    p.discharge_actual_m3h,
                    p.ewh_actual_h,
                    p.discharge_plan_m3h,
                    p.ewh_plan_h
                );
            }
            println!();
        }

        for record in &view.records {
            if let Some(a) = assessments.get(&record.key()).filter(|a| !a.is_nominal()) {
                for rec in &a.recommendations {
                    println!("🚨 {} {}: {}", record.date, record.pit, rec);
                }
            }
        }

        for err in &errors {
            println!("⚠️  {}", err);
        }
    }

    if let Some(port) = cli.endpoint {
        println!("\n🚀 Starting HTTP endpoint server...");
        let reload = snapshot_source(cli.snapshot.as_deref())
            .unwrap_or_else(|e| fail("Failed to open readings for the endpoint", e));
        let state = EndpointState::new(config, readings);
        if let Err(e) = endpoint::start_endpoint_server(port, state, Some(reload)) {
            fail("Endpoint server error", e);
        }
    }
}

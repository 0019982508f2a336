/// sumpmon_service: water balance reconciliation for mine dewatering sumps.
///
/// # Module structure
///
/// ```text
/// sumpmon_service
/// ├── model       — shared data types (readings, WaterBalanceRecord, RecordError, …)
/// ├── config      — efficiency floor, entry defaults and site registry (sumps.toml)
/// ├── db          — PostgreSQL Reading Store: connection + snapshot loading
/// ├── endpoint    — read-only JSON API over a computed report
/// ├── dashboard   — month / pit / unit period view with headline summary
/// ├── logging     — tracing subscriber setup (SUMPMON_LOG)
/// ├── ingest
/// │   ├── snapshot — JSON snapshot files
/// │   └── fixtures (test only) — representative readings
/// ├── monitor     — snapshot-keyed recomputation cache
/// ├── alert
/// │   └── classify — severity, recommendations, pump efficiency
/// └── analysis
///     ├── groupings — (site, pit) grouping, date ordering, duplicate detection
///     ├── outflow   — pump discharge aggregation
///     ├── inflow    — rain and groundwater inflow
///     └── balance   — carry-forward reconciliation pass
/// ```

/// Public modules
pub mod alert;
pub mod analysis;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod endpoint;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod monitor;

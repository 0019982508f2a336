/// HTTP endpoint for querying water balance results
///
/// Read-only JSON API over the current readings, so the site dashboards and
/// ad-hoc scripts can pull reconciled records without linking the engine.
/// The state owns the snapshot and a `BalanceCache`; readings can be
/// reloaded before each request and the report is only recomputed when
/// they changed.
///
/// Endpoints:
/// - GET /health - Service health check
/// - GET /sites - Site codes with their pits
/// - GET /balance/{site}/{pit} - Records, per-day errors and assessments for one sump

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::alert::classify::{Assessment, UnitSelection, assess_report};
use crate::analysis::balance::BalanceReport;
use crate::analysis::groupings;
use crate::config::SumpsConfig;
use crate::model::{ReadingKey, ReadingSnapshot, WaterBalanceRecord};
use crate::monitor::BalanceCache;

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SiteSummary {
    pub code: String,
    pub name: Option<String>,
    pub pits: Vec<String>,
}

/// One day of a sump, in date order.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DayResponse {
    Record {
        record: WaterBalanceRecord,
        assessment: Option<Assessment>,
        status: String,
    },
    Error {
        date: chrono::NaiveDate,
        message: String,
    },
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub site: String,
    pub pit: String,
    pub days: Vec<DayResponse>,
    pub error_count: usize,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Readings being served plus the cache of the report computed from them.
pub struct EndpointState {
    config: SumpsConfig,
    snapshot: ReadingSnapshot,
    cache: BalanceCache,
}

impl EndpointState {
    pub fn new(config: SumpsConfig, snapshot: ReadingSnapshot) -> Self {
        Self {
            config,
            snapshot,
            cache: BalanceCache::new(),
        }
    }

    /// Swaps in freshly loaded readings. The cached report stays valid if
    /// the new snapshot hashes the same.
    pub fn replace_snapshot(&mut self, snapshot: ReadingSnapshot) {
        self.snapshot = snapshot;
    }

    pub fn cache(&self) -> &BalanceCache {
        &self.cache
    }

    fn sites(&self) -> Vec<SiteSummary> {
        self.config
            .merged_site_map(&groupings::site_map(&self.snapshot.sump_readings))
            .into_iter()
            .map(|(code, pits)| SiteSummary {
                name: self.config.find_site(&code).map(|s| s.name.clone()),
                code,
                pits,
            })
            .collect()
    }
}

fn balance_for(
    report: &BalanceReport,
    assessments: &BTreeMap<ReadingKey, Assessment>,
    site: &str,
    pit: &str,
) -> Option<BalanceResponse> {
    let group = report.group(site, pit)?;
    let days = group
        .outcomes
        .iter()
        .map(|outcome| match outcome {
            Ok(record) => {
                let assessment = assessments.get(&record.key()).cloned();
                let status = assessment
                    .as_ref()
                    .map(|a| a.status_label())
                    .unwrap_or_else(|| "unassessed".to_string());
                DayResponse::Record {
                    record: record.clone(),
                    assessment,
                    status,
                }
            }
            Err(err) => DayResponse::Error {
                date: err.key().date,
                message: err.to_string(),
            },
        })
        .collect();

    Some(BalanceResponse {
        site: site.to_string(),
        pit: pit.to_string(),
        days,
        error_count: group.errors().count(),
    })
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

fn not_found(message: impl Into<String>) -> (u16, serde_json::Value) {
    (
        404,
        serde_json::json!({
            "error": message.into(),
            "available_endpoints": ["/health", "/sites", "/balance/{site}/{pit}"]
        }),
    )
}

fn to_json<T: Serialize>(value: &T) -> (u16, serde_json::Value) {
    match serde_json::to_value(value) {
        Ok(json) => (200, json),
        Err(e) => (500, serde_json::json!({ "error": e.to_string() })),
    }
}

/// Maps a request path to a status code and JSON body.
pub fn route(url: &str, state: &mut EndpointState) -> (u16, serde_json::Value) {
    let path = url.split('?').next().unwrap_or(url);

    if path == "/sites" {
        return to_json(&state.sites());
    }

    let report = match state.cache.get_or_compute(&state.snapshot) {
        Ok(report) => report,
        Err(e) => return (500, serde_json::json!({ "error": e.to_string() })),
    };

    if path == "/health" {
        return (
            200,
            serde_json::json!({
                "status": "ok",
                "service": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "records": report.record_count(),
                "errors": report.errors().count(),
            }),
        );
    }

    if let Some(rest) = path.strip_prefix("/balance/") {
        let Some((site, pit)) = rest.split_once('/') else {
            return not_found("expected /balance/{site}/{pit}");
        };
        let (Ok(site), Ok(pit)) = (urlencoding::decode(site), urlencoding::decode(pit)) else {
            return (400, serde_json::json!({ "error": "invalid percent-encoding" }));
        };
        let pumps = state.snapshot.valid_pump_readings();
        let assessments =
            assess_report(report, &pumps, &UnitSelection::All, &state.config.thresholds);
        return match balance_for(report, &assessments, &site, &pit) {
            Some(response) => to_json(&response),
            None => not_found(format!("no readings for {}/{}", site, pit)),
        };
    }

    not_found("Not found")
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Loads the current readings for a request.
pub type SnapshotSource =
    Box<dyn FnMut() -> Result<ReadingSnapshot, Box<dyn std::error::Error + Send + Sync>>>;

/// Start HTTP endpoint server on the specified port. Blocks serving requests.
///
/// With a `reload` source the readings are re-read before every request; a
/// failed reload keeps serving the previous snapshot.
pub fn start_endpoint_server(
    port: u16,
    mut state: EndpointState,
    mut reload: Option<SnapshotSource>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))?;

    info!(port, "HTTP endpoint listening");
    println!("📡 HTTP endpoint listening on http://0.0.0.0:{}", port);
    println!("   GET /health");
    println!("   GET /sites");
    println!("   GET /balance/{{site}}/{{pit}}\n");

    for request in server.incoming_requests() {
        if let Some(load) = reload.as_mut() {
            match load() {
                Ok(snapshot) => state.replace_snapshot(snapshot),
                Err(e) => warn!(error = %e, "reload failed, serving previous readings"),
            }
        }

        let (status, json) = route(request.url(), &mut state);
        debug!(
            url = request.url(),
            status,
            cache_hits = state.cache().hits(),
            cache_misses = state.cache().misses(),
            "request served"
        );
        let response = create_response(status, &json)?;
        if let Err(e) = request.respond(response) {
            warn!(error = %e, "failed to send response");
        }
    }

    Ok(())
}

/// Create HTTP response with JSON body
fn create_response(
    status_code: u16,
    json: &serde_json::Value,
) -> Result<tiny_http::Response<std::io::Cursor<Vec<u8>>>, Box<dyn std::error::Error + Send + Sync>>
{
    let body = serde_json::to_string_pretty(json)?;
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .map_err(|_| "invalid content-type header")?;

    Ok(tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code))
        .with_header(header))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Reading Store adapters that produce a `ReadingSnapshot`.
///
/// - `snapshot` — JSON snapshot files exported by the entry application.
/// - `fixtures` (test only) — reading builders and sample payloads.
///
/// The PostgreSQL store lives in `crate::db`.

pub mod snapshot;

#[cfg(test)]
pub(crate) mod fixtures;

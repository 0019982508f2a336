/// Status classification and recommendations.
///
/// - `classify` — elevation danger, balance consistency, pump efficiency,
///   and the prioritised recommendation set built from them.

pub mod classify;

/// Water balance analysis for the sump monitoring service.
///
/// Submodules, in data-flow order:
/// - `groupings` — partitions flat readings per (site, pit) and orders them.
/// - `outflow`   — sums pump unit withdrawals per (site, pit, date).
/// - `inflow`    — converts rainfall and groundwater into inflow volume.
/// - `balance`   — carry-forward reconciliation and the full computation pass.

pub mod balance;
pub mod groupings;
pub mod inflow;
pub mod outflow;

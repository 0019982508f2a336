/// Tracing subscriber setup.
///
/// `SUMPMON_LOG` takes a standard `EnvFilter` directive
/// (e.g. `sumpmon_service=debug`) and overrides `--verbose`.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "SUMPMON_LOG";

pub fn default_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "warn" }
}

/// Installs the global subscriber. Logs go to stderr so `--json` output on
/// stdout stays machine-readable.
pub fn init(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()?;
    Ok(())
}

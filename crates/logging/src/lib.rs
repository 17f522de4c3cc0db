//! Logging setup shared by the dexboot binaries

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,dexboot=debug";

/// Filter used with `--verbose`
pub const VERBOSE_FILTER: &str = "debug";

/// Pick the filter directive: `RUST_LOG` wins, then `--verbose`, then the
/// default.
pub fn filter_directive(env: Option<&str>, verbose: bool) -> String {
    match env {
        Some(directive) if !directive.trim().is_empty() => directive.to_string(),
        _ if verbose => VERBOSE_FILTER.to_string(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(verbose: bool) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::try_new(filter_directive(env.as_deref(), verbose))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init();
}

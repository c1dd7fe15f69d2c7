//! Observability subsystem for strata
//!
//! Logging goes through `tracing`. Library code only emits events; the
//! binary decides where they go by installing a subscriber with
//! [`init_tracing`].
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. Every line carries `event = <EVENT_NAME>`
//! 3. Per-operation detail is `debug`, gated by `InfoStream`

mod events;

pub use events::Event;

use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the log filter.
pub const LOG_ENV: &str = "STRATA_LOG";

/// Filter used when `STRATA_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Install a global fmt subscriber writing to stderr. Returns false when
/// a subscriber was already installed; the first one stays.
pub fn init_tracing(verbose: bool) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

//! Process-wide default logging setup
//!
//! Everything in the runtime logs through `tracing` with a
//! `logger = "ladoga"` field; components prefer the ambient subscriber and
//! this module is the fallback wiring for binaries.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a formatting subscriber as the process-wide default, once.
/// Honors `RUST_LOG`, defaulting to `info`.
pub fn init() {
    init_with("info")
}

/// Installs a formatting subscriber with `default_filter` when `RUST_LOG`
/// is not set. A subscriber installed earlier by the host wins.
pub fn init_with(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init();
    });
}

//! Logging setup for binaries, benches and tests embedding fanseek.
//!
//! The library only emits `tracing` events; nothing is printed unless a
//! subscriber is installed.
//!
//! # Environment Variables
//!
//! - `FANSEEK_LOG` - Log filter (overrides RUST_LOG)
//! - `RUST_LOG` - Standard Rust log filter (fallback)

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "FANSEEK_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Resolve the filter directive from the environment
pub fn filter_from_env() -> EnvFilter {
    std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a global fmt subscriber; a second call is a no-op
pub fn init() {
    let _ = fmt()
        .with_env_filter(filter_from_env())
        .with_thread_names(true)
        .with_target(false)
        .try_init();
}

/// Subscriber writing through the test harness capture
pub fn init_for_tests() {
    let _ = fmt()
        .with_env_filter(filter_from_env())
        .with_test_writer()
        .try_init();
}

//! Subscriber installation

use memberdesk_domain::LoggingConfig;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

const FALLBACK_FILTER: &str = "info";

/// Resolve the filter: `RUST_LOG` wins, then the configured directive
fn build_filter(config: &LoggingConfig) -> EnvFilter {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    resolve_filter(from_env.as_deref(), &config.filter)
}

fn resolve_filter(from_env: Option<&str>, configured: &str) -> EnvFilter {
    from_env
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_new(configured).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_FILTER))
}

/// Install the global subscriber
///
/// Returns `false` if a subscriber was already installed (tests, embedding
/// hosts); the existing one is kept.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = build_filter(config);
    let installed = if config.json {
        fmt().with_env_filter(filter).json().with_current_span(true).try_init()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init()
    };
    installed.is_ok()
}

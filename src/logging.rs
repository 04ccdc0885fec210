//! Tracing subscriber setup for the `montage` binary.
//!
//! Events always go to stderr; `montage plan` writes its JSON to stdout.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Level used when neither `RUST_LOG` nor the configured level parses.
const FALLBACK_LEVEL: &str = "info";

/// Resolve the event filter: `env` (the `RUST_LOG` value) when set and valid, else `level`,
/// else `info`.
pub fn resolve_filter(env: Option<&str>, level: &str) -> EnvFilter {
    env.filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_LEVEL))
}

/// Install the global subscriber described by `config`.
///
/// Human output is compact with level and message only; JSON output carries the current span
/// so lines from one render can be grouped. Returns `false` when a subscriber was already
/// installed, in which case the first one stays.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = resolve_filter(env.as_deref(), &config.level);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if config.json {
        builder
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .try_init()
    } else {
        builder.compact().with_target(false).without_time().try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
#[path = "../tests/unit/logging.rs"]
mod tests;

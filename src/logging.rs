//! Process-wide logging.
//!
//! Output goes to stderr in one of two forms: human readable (the default) or
//! one JSON object per line when `INNERVOICE_LOG_JSONL=1`.
//!
//! Filters come from `INNERVOICE_LOG` using the usual `tracing` directive
//! syntax, e.g. `INNERVOICE_LOG=innervoice=debug,tower_http=info`. The default
//! level is `info`.

use std::io::IsTerminal;
use std::sync::Once;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Filter directives.
pub const FILTER_ENV: &str = "INNERVOICE_LOG";

/// Set to `1` for JSON lines output.
pub const JSONL_ENV: &str = "INNERVOICE_LOG_JSONL";

static INIT: Once = Once::new();

/// Initialize the global subscriber. Later calls are no-ops.
pub fn init() {
    INIT.call_once(setup_logging);
}

fn jsonl_logging_enabled() -> bool {
    std::env::var(JSONL_ENV).is_ok_and(|value| is_truthy(&value))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn setup_logging() {
    let filter_layer = filters();
    // Each builder method returns a distinct type, so both arms are spelled out.
    if jsonl_logging_enabled() {
        let l = fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .with_filter(filter_layer);
        tracing_subscriber::registry().with(l).init();
    } else {
        let l = fmt::layer()
            .compact()
            .with_ansi(std::io::stderr().is_terminal())
            .with_writer(std::io::stderr)
            .with_filter(filter_layer);
        tracing_subscriber::registry().with(l).init();
    }
}

fn filters() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(FILTER_ENV)
        .from_env_lossy()
}

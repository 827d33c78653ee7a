//! Logging and tracing infrastructure.
//!
//! This module provides structured logging using the tracing crate,
//! with support for different output formats and filtering.

use std::sync::Once;
use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
///
/// This should be called once at program startup.
/// Subsequent calls are ignored.
pub fn init_tracing() {
    init_with_config(&LoggingConfig::default());
}

/// Initialize tracing with JSON output for structured logging.
pub fn init_tracing_json() {
    init_with_config(&LoggingConfig {
        json: true,
        ..LoggingConfig::default()
    });
}

/// Initialize tracing from a [`LoggingConfig`]. `RUST_LOG` wins over the
/// configured level when set.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = env_filter(&config.level);

        // try_init: a host application may already own the global subscriber.
        let result = if config.json {
            let fmt_layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_current_span(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        } else {
            let fmt_layer = fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        };

        match result {
            Ok(()) => info!(json = config.json, "xrefsel tracing initialized"),
            Err(err) => debug!(error = %err, "tracing subscriber already installed"),
        }
    });
}

/// Macro for creating spans
#[macro_export]
macro_rules! span_trace {
    ($name:expr) => {
        tracing::info_span!($name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

/// Macro for logging and returning errors
#[macro_export]
macro_rules! log_error {
    ($err:expr) => {{
        let e = $err;
        tracing::error!(error = %e, "Operation failed");
        e
    }};
    ($err:expr, $msg:expr) => {{
        let e = $err;
        tracing::error!(error = %e, message = $msg, "Operation failed");
        e
    }};
}

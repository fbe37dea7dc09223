//! Structured logging system using tracing crate
//!
//! Provides machine-readable logging to standard error with span macros for the
//! daemon's operations.
//!
//! ## Log Level
//!
//! Driven by the command line: warnings and above by default, `-v` for info,
//! `-d` for debug (overrides `-v`). `RUST_LOG` overrides both.
//!
//! ## Log Format
//!
//! Controlled by the `LOG_FORMAT` environment variable:
//!
//! - `json` - Structured JSON format (default)
//! - `pretty` - Human-readable format with colors and indentation for development
//! - `compact` - Terminal-friendly format with colors but minimal spacing
//!
//! ## Environment Variables
//!
//! - `LOG_FORMAT`: Output format (json, pretty, compact) - defaults to json
//! - `LOG_SPANS`: Include span events (true/false) - defaults to false
//! - `RUST_LOG`: Override log filtering (follows env_logger format)
//!
//! The broker client logs through the `log` facade; those records are bridged into
//! tracing by the subscriber and capped at warn unless debug logging is requested.

use std::env;
use std::io;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format for structured logging (machine-readable)
    Json,
    /// Pretty format with colors and indentation (human-readable)
    Pretty,
    /// Compact format with colors but minimal spacing (terminal-friendly)
    Compact,
}

impl LogFormat {
    /// Parse log format from string
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Resolved logging settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
    pub include_spans: bool,
}

impl LoggingConfig {
    /// Level from the verbosity flags, format and spans from the environment
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        let format = env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
        let include_spans = env::var("LOG_SPANS")
            .map(|v| parse_bool_flag(&v))
            .unwrap_or(false);

        Self {
            level: level_from_flags(verbose, debug),
            format: LogFormat::parse(&format),
            include_spans,
        }
    }
}

/// Debug wins over verbose; neither means warnings and above
pub fn level_from_flags(verbose: bool, debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

fn parse_bool_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Filter for the given level. Dependency noise is capped unless debugging.
pub fn build_filter(level: Level) -> EnvFilter {
    if let Ok(rust_log) = env::var("RUST_LOG") {
        if let Ok(filter) = EnvFilter::try_new(rust_log) {
            return filter;
        }
    }

    let directives = if level >= Level::DEBUG {
        level.to_string()
    } else {
        format!("{level},rumqttc=warn,tokio=warn")
    };
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    let subscriber = tracing_subscriber::registry().with(build_filter(config.level));
    let span_events = if config.include_spans {
        fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE
    } else {
        fmt::format::FmtSpan::NONE
    };

    let result = match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_span_events(span_events);
            subscriber.with(fmt_layer).try_init()
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_ansi(true)
                .with_writer(io::stderr)
                .with_span_events(span_events);
            subscriber.with(fmt_layer).try_init()
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_ansi(true)
                .with_target(false)
                .with_writer(io::stderr)
                .with_span_events(span_events);
            subscriber.with(fmt_layer).try_init()
        }
    };

    if let Err(e) = result {
        eprintln!("Logging already initialised: {e}");
    }
}

/// Create an MQTT operation span
#[macro_export]
macro_rules! mqtt_span {
    ($($field:tt)*) => {
        tracing::info_span!("mqtt_operation", $($field)*)
    };
}

/// Create a host action dispatch span
#[macro_export]
macro_rules! dispatch_span {
    ($($field:tt)*) => {
        tracing::info_span!("host_action", $($field)*)
    };
}

/// Create a lifecycle event span
#[macro_export]
macro_rules! lifecycle_span {
    ($($field:tt)*) => {
        tracing::info_span!("lifecycle_event", $($field)*)
    };
}

// Re-export macros for convenience
pub use {dispatch_span, lifecycle_span, mqtt_span};

//! Observability for the raspi-off daemon
//!
//! Structured logging via tracing, configured from command-line verbosity flags
//! and environment variables.

pub mod logging;

// Re-export for convenience
pub use logging::{init_logging, level_from_flags, LogFormat, LoggingConfig};

// Span macros for structured logging
pub use logging::{dispatch_span, lifecycle_span, mqtt_span};

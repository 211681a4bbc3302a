//! Structured logging system using tracing crate
//!
//! Provides contextual, machine-readable logging with span macros for the
//! broker connection lifecycle.
//!
//! ## Log Format Options
//!
//! - `json` - Structured JSON format for production and log aggregation systems
//! - `pretty` - Human-readable format with colors and indentation for development
//! - `compact` - Terminal-friendly format with colors but minimal spacing
//!
//! ## Environment Variables
//!
//! Values from the `[logging]` config section can be overridden at runtime:
//!
//! - `LOG_LEVEL`: Log level (ERROR, WARN, INFO, DEBUG, TRACE)
//! - `LOG_FORMAT`: Output format (json, pretty, compact)
//! - `LOG_SPANS`: Include span events (true/false) - defaults to false
//! - `RUST_LOG`: Override log filtering entirely (follows env_logger format)
//!
//! ## Log sink
//!
//! Lines are written to stdout. The component name and the configured sink
//! endpoint are recorded on the root [`service_span!`] so a shipper tailing
//! stdout can route every line without parsing the message.

use std::env;
use tracing::Level;
use tracing_subscriber::{filter::Directive, fmt, prelude::*, util::TryInitError, EnvFilter};

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
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json, // Default to JSON for production
        }
    }
}

/// Parameters for the logging subsystem
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: Level,
    pub format: LogFormat,
    /// Component name recorded on the root span
    pub component: String,
    /// Log sink endpoint recorded on the root span
    pub sink_url: Option<String>,
    pub include_spans: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            component: "amqpConnection".to_string(),
            sink_url: None,
            include_spans: false,
        }
    }
}

impl LoggingSettings {
    /// Apply `LOG_LEVEL`, `LOG_FORMAT` and `LOG_SPANS` on top of these settings
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.level = crate::config::parse_level(&level);
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.format = LogFormat::parse(&format);
        }
        if let Ok(spans) = env::var("LOG_SPANS") {
            self.include_spans = parse_flag(&spans);
        }
        self
    }
}

fn parse_flag(value: &str) -> bool {
    value.trim().to_lowercase() == "true"
}

/// Dependencies whose chatter is capped at WARN
const QUIET_TARGETS: &[&str] = &["lapin", "amq_protocol", "pinky_swear", "async_io", "polling"];

fn build_filter(level: Level) -> EnvFilter {
    // Allow RUST_LOG to override
    if let Ok(rust_log) = env::var("RUST_LOG") {
        return EnvFilter::new(rust_log);
    }

    QUIET_TARGETS
        .iter()
        .filter_map(|target| format!("{target}=warn").parse::<Directive>().ok())
        .fold(EnvFilter::new(level.to_string()), |filter, directive| {
            filter.add_directive(directive)
        })
}

fn span_events(include_spans: bool) -> fmt::format::FmtSpan {
    if include_spans {
        fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE
    } else {
        fmt::format::FmtSpan::NONE
    }
}

/// Install the global subscriber
pub fn init_logging(settings: &LoggingSettings) -> Result<(), TryInitError> {
    let subscriber = tracing_subscriber::registry().with(build_filter(settings.level));
    let events = span_events(settings.include_spans);

    match settings.format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_span_events(events))
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().pretty().with_ansi(true).with_span_events(events))
            .try_init(),
        LogFormat::Compact => subscriber
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_span_events(events),
            )
            .try_init(),
    }
}

/// Initialize logging from environment variables only
pub fn init_default_logging() -> Result<(), TryInitError> {
    init_logging(&LoggingSettings::default().with_env_overrides())
}

/// Create the root span for the service, carrying component and sink
#[macro_export]
macro_rules! service_span {
    ($settings:ident) => {
        tracing::info_span!(
            "service",
            component = %$settings.component,
            sink = $settings.sink_url.as_deref().unwrap_or("stdout")
        )
    };
}

/// Create a broker operation span
#[macro_export]
macro_rules! broker_span {
    ($($field:tt)*) => {
        tracing::info_span!("broker_operation", $($field)*)
    };
}

/// Create a lifecycle event span
#[macro_export]
macro_rules! lifecycle_span {
    (parent: $parent:expr, $($field:tt)*) => {
        tracing::info_span!(parent: $parent, "lifecycle_event", $($field)*)
    };
    ($($field:tt)*) => {
        tracing::info_span!("lifecycle_event", $($field)*)
    };
}

// Re-export macros for convenience
pub use {broker_span, lifecycle_span, service_span};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("Compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse(" json\n"), LogFormat::Json);
    }

    #[test]
    fn test_log_format_parse_invalid_defaults_to_json() {
        assert_eq!(LogFormat::parse("invalid"), LogFormat::Json);
        assert_eq!(LogFormat::parse(""), LogFormat::Json);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
    }

    #[test]
    fn test_default_settings() {
        let settings = LoggingSettings::default();
        assert_eq!(settings.level, Level::INFO);
        assert_eq!(settings.format, LogFormat::Json);
        assert_eq!(settings.sink_url, None);
        assert!(!settings.include_spans);
    }

    #[test]
    fn test_parse_flag() {
        let cases = vec![
            ("true", true),
            ("TRUE", true),
            (" True ", true),
            ("false", false),
            ("", false),
            ("yes", false),
            ("1", false),
        ];

        for (input, expected) in cases {
            assert_eq!(parse_flag(input), expected, "Failed for input: '{input}'");
        }
    }

    #[test]
    fn test_quiet_targets_parse_as_directives() {
        for target in QUIET_TARGETS {
            let directive: Result<Directive, _> = format!("{target}=warn").parse();
            assert!(directive.is_ok(), "Bad directive for {target}");
        }
    }

    #[test]
    fn test_service_span_builds_without_sink() {
        let settings = LoggingSettings::default();
        let span = service_span!(settings);
        let _entered = span.enter();
    }
}

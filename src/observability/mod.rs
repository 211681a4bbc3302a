//! Observability for amqp-link
//!
//! Structured logging only; the service has no metrics or health surface.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat, LoggingSettings};

// Span macros for structured logging
pub use logging::{broker_span, lifecycle_span, service_span};

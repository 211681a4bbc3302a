//! Tests for logging configuration and format parsing

use amqp_link::config::ServiceConfig;
use amqp_link::observability::logging::{LogFormat, LoggingSettings};
use tracing::Level;

#[test]
fn test_log_format_parse_known_formats() {
    assert_eq!(LogFormat::parse("json"), LogFormat::Json);
    assert_eq!(LogFormat::parse("Pretty"), LogFormat::Pretty);
    assert_eq!(LogFormat::parse("COMPACT"), LogFormat::Compact);
}

#[test]
fn test_log_format_parse_whitespace() {
    assert_eq!(LogFormat::parse("  json  "), LogFormat::Json);
    assert_eq!(LogFormat::parse("pretty\n"), LogFormat::Pretty);
    assert_eq!(LogFormat::parse("\tcompact"), LogFormat::Compact);
}

#[test]
fn test_log_format_parse_invalid_defaults_to_json() {
    assert_eq!(LogFormat::parse("yaml"), LogFormat::Json);
    assert_eq!(LogFormat::parse("123"), LogFormat::Json);
}

#[test]
fn test_settings_follow_logging_section() {
    let config = ServiceConfig::from_toml_str(
        r#"
[service]
name = "order-service"

[broker]
endpoint = "amqp://valid-host:5672"

[logging]
component = "orderQueueConnection"
level = "warn"
format = "compact"
sink_url = "http://elasticsearch:9200"
"#,
    )
    .unwrap();

    let settings = config.logging_settings();

    assert_eq!(
        settings,
        LoggingSettings {
            level: Level::WARN,
            format: LogFormat::Compact,
            component: "orderQueueConnection".to_string(),
            sink_url: Some("http://elasticsearch:9200".to_string()),
            include_spans: false,
        }
    );
}

#[test]
fn test_settings_default_without_logging_section() {
    let config = ServiceConfig::from_toml_str(
        r#"
[service]
name = "order-service"

[broker]
endpoint = "amqp://valid-host:5672"
"#,
    )
    .unwrap();

    let settings = config.logging_settings();

    assert_eq!(settings.level, Level::INFO);
    assert_eq!(settings.format, LogFormat::Json);
    assert_eq!(settings.sink_url, None);
}

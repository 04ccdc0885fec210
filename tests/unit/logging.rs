use tracing_subscriber::filter::LevelFilter;

use super::*;

#[test]
fn configured_level_applies_without_env() {
    let filter = resolve_filter(None, "warn");
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
}

#[test]
fn env_overrides_configured_level() {
    let filter = resolve_filter(Some("debug"), "warn");
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
}

#[test]
fn blank_or_invalid_env_falls_back_to_config() {
    assert_eq!(
        resolve_filter(Some("  "), "error").max_level_hint(),
        Some(LevelFilter::ERROR)
    );
    assert_eq!(
        resolve_filter(Some("montage=loud"), "error").max_level_hint(),
        Some(LevelFilter::ERROR)
    );
}

#[test]
fn invalid_level_falls_back_to_info() {
    let filter = resolve_filter(None, "montage=loud");
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
}

#[test]
fn second_init_keeps_first_subscriber() {
    let config = LoggingConfig {
        level: "error".to_string(),
        json: false,
    };
    init_logging(&config);
    assert!(!init_logging(&LoggingConfig {
        json: true,
        ..config
    }));
}

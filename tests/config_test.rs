//! Tests for configuration loading: file, environment and validation

use std::io::Write;
use std::path::PathBuf;

use serial_test::serial;
use startrail::config::Config;
use tempfile::NamedTempFile;

const ENV_KEYS: &[&str] = &[
    "STARTRAIL_API_BASE_URL",
    "STARTRAIL_USER_AGENT",
    "GITHUB_TOKEN",
    "STARTRAIL_REQUEST_TIMEOUT",
    "STARTRAIL_DETAIL_INTERVAL_MS",
    "STARTRAIL_SQLITE_PATH",
    "STARTRAIL_MIN_STARS",
    "STARTRAIL_VERIFY_PROJECT_EXISTS",
    "STARTRAIL_COLLECT_TIME",
    "STARTRAIL_HISTORY_TIME",
    "STARTRAIL_RUN_ON_STARTUP",
    "STARTRAIL_HOST",
    "STARTRAIL_PORT",
    "STARTRAIL_ENABLE_CORS",
    "STARTRAIL_LOG_LEVEL",
    "STARTRAIL_LOG_FORMAT",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_load_defaults_without_file() {
    clear_env();
    let config = Config::load(None).unwrap();

    assert_eq!(config.github.api_base_url, "https://api.github.com");
    assert_eq!(config.collector.min_stars, 100);
    assert_eq!(config.scheduler.collect_time, "02:00");
    assert_eq!(config.scheduler.history_time, "03:00");
    assert!(config.github.token.is_none());
}

#[test]
#[serial]
fn test_load_from_file() {
    clear_env();
    let file = write_config(
        r#"
        [github]
        user_agent = "startrail-test"
        detail_interval_ms = 250

        [database]
        sqlite_path = "/tmp/startrail/test.db"

        [collector]
        min_stars = 5000
        history_page_size = 50

        [scheduler]
        collect_time = "04:30"
        run_on_startup = true
        "#,
    );

    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(config.github.user_agent, "startrail-test");
    assert_eq!(config.github.detail_interval_ms, 250);
    assert_eq!(config.database.sqlite_path, PathBuf::from("/tmp/startrail/test.db"));
    assert_eq!(config.collector.min_stars, 5000);
    assert_eq!(config.collector.history_page_size, 50);
    assert_eq!(config.scheduler.collect_time, "04:30");
    assert_eq!(config.scheduler.history_time, "03:00");
    assert!(config.scheduler.run_on_startup);
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let file = write_config(
        r#"
        [collector]
        min_stars = 5000

        [server]
        port = 8080
        "#,
    );

    std::env::set_var("STARTRAIL_MIN_STARS", "250");
    std::env::set_var("STARTRAIL_PORT", "9090");
    std::env::set_var("GITHUB_TOKEN", "ghp_example");
    std::env::set_var("STARTRAIL_HISTORY_TIME", "05:15");

    let config = Config::load(Some(file.path()));
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.collector.min_stars, 250);
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.github.token.as_deref(), Some("ghp_example"));
    assert_eq!(config.scheduler.history_time, "05:15");
}

#[test]
#[serial]
fn test_unparseable_env_value_is_ignored() {
    clear_env();
    std::env::set_var("STARTRAIL_PORT", "not-a-port");

    let config = Config::from_env();
    clear_env();

    assert_eq!(config.unwrap().server.port, Config::default().server.port);
}

#[test]
#[serial]
fn test_invalid_env_time_fails_validation() {
    clear_env();
    std::env::set_var("STARTRAIL_COLLECT_TIME", "2am");

    let result = Config::load(None);
    clear_env();

    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("collect_time"));
}

#[test]
#[serial]
fn test_missing_file_is_an_error() {
    clear_env();
    let path = PathBuf::from("/nonexistent/startrail/config.toml");
    let err = Config::load(Some(path.as_path())).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
#[serial]
fn test_malformed_toml_is_an_error() {
    clear_env();
    let file = write_config("[collector\nmin_stars = ");
    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML"));
}

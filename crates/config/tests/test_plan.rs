//! Tests for the `parlor-config` loader: defaults, file discovery,
//! environment overrides and validation.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use parlor_config::{load, AppConfig, ClientConfig, HttpConfig, ReconnectConfig, RoomSeed};

const ENV_VARS_TO_RESET: &[&str] = &[
    "PARLOR_CONFIG",
    "PARLOR__CLIENT__BASE_URL",
    "PARLOR__CLIENT__OUTBOUND_BUFFER",
    "PARLOR__CLIENT__RECONNECT__INITIAL_DELAY_MS",
    "PARLOR__CLIENT__RECONNECT__MAX_ATTEMPTS",
    "PARLOR__CLIENT__RECONNECT__MAX_DELAY_MS",
    "PARLOR__DATABASE__MAX_CONNECTIONS",
    "PARLOR__DATABASE__URL",
    "PARLOR__HTTP__ADDRESS",
    "PARLOR__HTTP__PORT",
    "PARLOR__REALTIME__BROADCAST_CAPACITY",
    "PARLOR__REALTIME__HISTORY_LIMIT",
    "PARLOR__REALTIME__MAX_MESSAGE_LENGTH",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(path, contents).expect("failed to write config file");
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.http.port, defaults.http.port);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(
        config.database.max_connections,
        defaults.database.max_connections
    );
    assert_eq!(
        config.realtime.broadcast_capacity,
        defaults.realtime.broadcast_capacity
    );
    assert_eq!(config.realtime.history_limit, defaults.realtime.history_limit);
    assert_eq!(config.client.base_url, defaults.client.base_url);
    assert_eq!(
        config.client.reconnect.initial_delay_ms,
        defaults.client.reconnect.initial_delay_ms
    );
    assert!(config.client.reconnect.max_attempts.is_none());
    assert!(config.rooms.is_empty());
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "parlor.toml",
        r#"
        [http]
        port = 4242
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "config/parlor.toml",
        r#"
        [http]
        port = 5151
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.http.port, 4242);
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "parlor.toml",
        r#"
        [http]
        port = 8181

        [realtime]
        history_limit = 25

        [client.reconnect]
        max_attempts = 3
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.http.port, 8181);
    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.realtime.history_limit, 25);
    assert_eq!(
        config.realtime.max_message_length,
        defaults.realtime.max_message_length
    );
    assert_eq!(config.client.reconnect.max_attempts, Some(3));
    assert_eq!(
        config.client.reconnect.max_delay_ms,
        defaults.client.reconnect.max_delay_ms
    );
}

#[test]
#[serial]
fn load_reads_seed_rooms_from_file() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "parlor.toml",
        r#"
        [[rooms]]
        id = "r1"
        name = "General"

        [[rooms]]
        id = "r2"
        name = "Random"
        "#,
    );

    let config = load().expect("configuration load should read rooms");
    assert_eq!(
        config.rooms,
        vec![
            RoomSeed {
                id: "r1".to_string(),
                name: "General".to_string(),
            },
            RoomSeed {
                id: "r2".to_string(),
                name: "Random".to_string(),
            },
        ]
    );
}

#[test]
#[serial]
fn load_honours_explicit_config_path() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "elsewhere/custom.toml",
        r#"
        [database]
        url = "sqlite://custom.db"
        "#,
    );
    let explicit = temp_dir.path().join("elsewhere/custom.toml");
    ctx.set_var("PARLOR_CONFIG", explicit.to_string_lossy());

    let config = load().expect("configuration load should read PARLOR_CONFIG");
    assert_eq!(config.database.url, "sqlite://custom.db");
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "parlor.toml",
        r#"
        [http]
        port = 3030
        "#,
    );

    ctx.set_var("PARLOR__HTTP__PORT", "8080");
    ctx.set_var("PARLOR__CLIENT__BASE_URL", "http://chat.internal:9000");

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.http.port, 8080);
    assert_eq!(config.client.base_url, "http://chat.internal:9000");
}

#[test]
#[serial]
fn load_repairs_zero_broadcast_capacity() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    ctx.set_var("PARLOR__REALTIME__BROADCAST_CAPACITY", "0");

    let config = load().expect("configuration load should succeed");
    assert_eq!(config.realtime.broadcast_capacity, 100);
}

#[test]
#[serial]
fn load_repairs_non_positive_history_limit() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "parlor.toml",
        r#"
        [realtime]
        history_limit = -5
        "#,
    );

    let config = load().expect("configuration load should succeed");
    assert_eq!(config.realtime.history_limit, 200);

    write_config_file(
        temp_dir.path(),
        "parlor.toml",
        r#"
        [realtime]
        history_limit = 0
        "#,
    );

    let config = load().expect("configuration load should succeed");
    assert_eq!(config.realtime.history_limit, 200);
}

#[test]
#[serial]
fn load_clamps_max_delay_below_initial_delay() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "parlor.toml",
        r#"
        [client.reconnect]
        initial_delay_ms = 2000
        max_delay_ms = 500
        "#,
    );

    let config = load().expect("configuration load should succeed");
    assert_eq!(config.client.reconnect.initial_delay_ms, 2000);
    assert_eq!(config.client.reconnect.max_delay_ms, 2000);
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "parlor.toml",
        r#"
        [http]
        port = "not-a-number
        "#,
    );

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration") || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn http_config_defaults_match_expected_host_and_port() {
    let defaults = HttpConfig::default();
    assert_eq!(defaults.address, "127.0.0.1");
    assert_eq!(defaults.port, 7070);
}

#[test]
fn reconnect_defaults_retry_forever() {
    let defaults = ReconnectConfig::default();
    assert_eq!(defaults.initial_delay_ms, 250);
    assert_eq!(defaults.max_delay_ms, 10_000);
    assert!(defaults.max_attempts.is_none());
}

#[test]
fn websocket_url_follows_base_url_scheme() {
    let mut client = ClientConfig::default();
    assert_eq!(client.websocket_url(), "ws://127.0.0.1:7070/ws");

    client.base_url = "https://chat.example.com".to_string();
    assert_eq!(client.websocket_url(), "wss://chat.example.com/ws");
}

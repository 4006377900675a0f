use super::*;

use std::{
    collections::HashMap,
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

fn no_env(_: &str) -> Option<String> {
    None
}

fn temp_settings_file(contents: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("control_panel_settings_test_{suffix}"));
    fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join(SETTINGS_FILE);
    fs::write(&path, contents).expect("write settings");
    path
}

#[test]
fn falls_back_to_defaults_without_file_or_env() {
    let settings =
        load_settings_from(Path::new("definitely/missing/control_panel.toml"), no_env)
            .expect("defaults are valid");
    assert_eq!(settings, Settings::default());
}

#[test]
fn file_values_apply_and_env_wins_over_file() {
    let path = temp_settings_file(
        r#"
backend_url = "https://agent.example.com/"
stream_url = "wss://agent.example.com/ws"
request_timeout_secs = 5
"#,
    );
    let env_values: HashMap<&str, &str> =
        HashMap::from([("APP__STREAM_URL", "ws://localhost:9000/events")]);

    let settings = load_settings_from(&path, |key| env_values.get(key).map(|v| v.to_string()))
        .expect("settings");

    assert_eq!(settings.backend_url, "https://agent.example.com");
    assert_eq!(settings.stream_url, "ws://localhost:9000/events");
    assert_eq!(settings.request_timeout_secs, 5);

    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn prefixed_env_overrides_plain_env() {
    let env_values: HashMap<&str, &str> = HashMap::from([
        ("AGENT_BACKEND_URL", "http://plain:1"),
        ("APP__BACKEND_URL", "http://prefixed:2"),
        ("APP__REQUEST_TIMEOUT_SECS", "not-a-number"),
    ]);
    let settings = load_settings_from(Path::new("missing.toml"), |key| {
        env_values.get(key).map(|v| v.to_string())
    })
    .expect("settings");

    assert_eq!(settings.backend_url, "http://prefixed:2");
    assert_eq!(settings.request_timeout_secs, 30);
}

#[test]
fn ignores_malformed_settings_file() {
    let path = temp_settings_file("backend_url = [");
    let settings = load_settings_from(&path, no_env).expect("defaults");
    assert_eq!(settings, Settings::default());
    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn rejects_stream_url_with_http_scheme() {
    let err = Settings {
        stream_url: "http://127.0.0.1:8000/ws".into(),
        ..Settings::default()
    }
    .validated()
    .expect_err("http stream url must be rejected");
    assert!(matches!(
        err,
        SettingsError::InvalidUrl {
            name: "stream_url",
            ..
        }
    ));
}

#[test]
fn rejects_unparseable_backend_url_and_zero_timeout() {
    let err = Settings {
        backend_url: "not a url".into(),
        ..Settings::default()
    }
    .validated()
    .expect_err("invalid backend url");
    assert!(matches!(
        err,
        SettingsError::InvalidUrl {
            name: "backend_url",
            ..
        }
    ));

    let err = Settings {
        request_timeout_secs: 0,
        ..Settings::default()
    }
    .validated()
    .expect_err("zero timeout");
    assert_eq!(err, SettingsError::ZeroTimeout);
}

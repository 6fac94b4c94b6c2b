use lab_portal::{
    AppConfig,
    config::{Env, SessionBackend},
};
use serial_test::serial;
use std::{env, panic, time::Duration};

const CONFIG_VARS: [&str; 8] = [
    "APP_ENV",
    "BIND_ADDR",
    "SESSION_BACKEND",
    "API_BASE_URL",
    "SESSION_JWT_SECRET",
    "SESSION_COOKIE",
    "SESSION_REFRESH_SECS",
    "AUTH_DEV_BYPASS",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with exactly `vars` set (every other config variable cleared),
/// then restores the original environment, re-panicking if the test panicked.
fn run_with_env<T, R>(vars: &[(&str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = CONFIG_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original_value) in originals {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_app_config_local_env_defaults() {
    let config = run_with_env(&[("APP_ENV", "local")], AppConfig::load);

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert_eq!(config.session_backend, SessionBackend::Jwt);
    assert_eq!(config.api_base_url, "http://localhost:8080/api");
    assert_eq!(config.session_cookie, "lab_session");
    assert_eq!(config.session_refresh, Duration::from_secs(120));
    assert!(!config.dev_role_header);
}

#[test]
#[serial]
fn test_app_config_reads_overrides() {
    let config = run_with_env(
        &[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("SESSION_BACKEND", "remote"),
            ("SESSION_COOKIE", "portal_sid"),
            ("SESSION_REFRESH_SECS", "45"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.bind_addr, "127.0.0.1:9000");
    assert_eq!(config.session_backend, SessionBackend::Remote);
    assert_eq!(config.session_cookie, "portal_sid");
    assert_eq!(config.session_refresh, Duration::from_secs(45));
}

#[test]
#[serial]
fn test_app_config_production_fail_fast() {
    // SESSION_JWT_SECRET is missing.
    let result = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("API_BASE_URL", "https://portal.example.edu/api"),
        ],
        || panic::catch_unwind(AppConfig::load),
    );

    assert!(
        result.is_err(),
        "Production config loading should panic on missing secrets"
    );
}

#[test]
#[serial]
fn test_app_config_production_defaults_to_remote_sessions() {
    let config = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("API_BASE_URL", "https://portal.example.edu/api"),
            ("SESSION_JWT_SECRET", "prod-secret"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.session_backend, SessionBackend::Remote);
    assert_eq!(config.api_base_url, "https://portal.example.edu/api");
}

#[test]
#[serial]
fn test_app_config_rejects_zero_refresh_period() {
    let result = run_with_env(&[("SESSION_REFRESH_SECS", "0")], || {
        panic::catch_unwind(AppConfig::load)
    });
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_missing_app_env_does_not_enable_role_header() {
    let config = run_with_env(&[], AppConfig::load);

    assert_eq!(config.env, Env::Local);
    assert!(!config.dev_role_header);
}

#[test]
#[serial]
fn test_role_header_is_opt_in_locally() {
    let config = run_with_env(&[("AUTH_DEV_BYPASS", "true")], AppConfig::load);
    assert!(config.dev_role_header);
}

#[test]
#[serial]
fn test_role_header_cannot_be_enabled_in_production() {
    let result = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("API_BASE_URL", "https://portal.example.edu/api"),
            ("SESSION_JWT_SECRET", "prod-secret"),
            ("AUTH_DEV_BYPASS", "1"),
        ],
        || panic::catch_unwind(AppConfig::load),
    );
    assert!(result.is_err());
}

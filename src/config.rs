use std::{env, time::Duration};

/// AppConfig
///
/// Holds the shell's entire configuration. Immutable once loaded and pulled
/// into handlers and extractors through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the local role-header bypass and log format.
    pub env: Env,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Which session collaborator answers `fetch_session`.
    pub session_backend: SessionBackend,
    // Base URL of the portal's REST API (remote session collaborator).
    pub api_base_url: String,
    // HS256 secret shared with the API for locally verified session tokens.
    pub jwt_secret: String,
    // Name of the browser cookie carrying the session token.
    pub session_cookie: String,
    // Period of the background session refresh.
    pub session_refresh: Duration,
    // Honour the `x-user-role` header as a stand-in session. Local only, opt-in.
    pub dev_role_header: bool,
}

/// Env
///
/// The runtime context: `Local` enables developer conveniences, `Production`
/// demands every secret explicitly.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// SessionBackend
///
/// `Remote` asks the REST API who the token belongs to; `Jwt` verifies the
/// token's signature and claims in-process.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionBackend {
    Remote,
    Jwt,
}

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_SESSION_COOKIE: &str = "lab_session";
pub const DEFAULT_REFRESH_SECS: u64 = 120;
const LOCAL_API_BASE_URL: &str = "http://localhost:8080/api";
const LOCAL_JWT_SECRET: &str = "lab-portal-local-session-secret";

impl Default for AppConfig {
    /// Safe values for tests; no environment access.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: "127.0.0.1:0".to_string(),
            session_backend: SessionBackend::Jwt,
            api_base_url: LOCAL_API_BASE_URL.to_string(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            session_refresh: Duration::from_secs(DEFAULT_REFRESH_SECS),
            dev_role_header: false,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables (call `dotenv` first).
    ///
    /// # Panics
    /// Fail-fast: panics when a production secret is missing or a value cannot
    /// be parsed, so the shell never starts half-configured.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let session_backend = match env::var("SESSION_BACKEND").as_deref() {
            Ok(raw) => parse_backend(raw)
                .unwrap_or_else(|| panic!("FATAL: SESSION_BACKEND must be `remote` or `jwt`, got `{raw}`")),
            Err(_) if env == Env::Production => SessionBackend::Remote,
            Err(_) => SessionBackend::Jwt,
        };

        let session_refresh = match env::var("SESSION_REFRESH_SECS") {
            Ok(raw) => parse_refresh_secs(&raw)
                .unwrap_or_else(|| panic!("FATAL: SESSION_REFRESH_SECS must be a positive integer, got `{raw}`")),
            Err(_) => Duration::from_secs(DEFAULT_REFRESH_SECS),
        };

        let dev_role_header = match env::var("AUTH_DEV_BYPASS").as_deref() {
            Ok(raw) => parse_flag(raw)
                .unwrap_or_else(|| panic!("FATAL: AUTH_DEV_BYPASS must be `true` or `false`, got `{raw}`")),
            Err(_) => false,
        };
        if dev_role_header && env == Env::Production {
            panic!("FATAL: AUTH_DEV_BYPASS cannot be enabled in production");
        }

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let session_cookie =
            env::var("SESSION_COOKIE").unwrap_or_else(|_| DEFAULT_SESSION_COOKIE.to_string());

        match env {
            Env::Local => Self {
                env,
                bind_addr,
                session_backend,
                api_base_url: env::var("API_BASE_URL")
                    .unwrap_or_else(|_| LOCAL_API_BASE_URL.to_string()),
                jwt_secret: env::var("SESSION_JWT_SECRET")
                    .unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                session_cookie,
                session_refresh,
                dev_role_header,
            },
            Env::Production => Self {
                env,
                bind_addr,
                session_backend,
                api_base_url: env::var("API_BASE_URL")
                    .expect("FATAL: API_BASE_URL required in production"),
                jwt_secret: env::var("SESSION_JWT_SECRET")
                    .expect("FATAL: SESSION_JWT_SECRET required in production"),
                session_cookie,
                session_refresh,
                dev_role_header: false,
            },
        }
    }
}

fn parse_backend(raw: &str) -> Option<SessionBackend> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "remote" => Some(SessionBackend::Remote),
        "jwt" => Some(SessionBackend::Jwt),
        _ => None,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" | "" => Some(false),
        _ => None,
    }
}

fn parse_refresh_secs(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

use lab_portal::{
    AppState, RouteTable,
    config::{AppConfig, Env, SessionBackend},
    create_router,
    session::{
        HttpSessionSource, JwtSessionSource, SessionSourceState, SessionStore, spawn_refresh_task,
    },
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound for one call to the remote session collaborator.
const SESSION_API_TIMEOUT: Duration = Duration::from_secs(10);

/// main
///
/// Boots the navigation shell: configuration, logging, route table, session
/// collaborator and refresh task, then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lab_portal=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Lab portal shell starting in {:?} mode", config.env);

    // 3. Route table: static for the life of the process.
    let routes = Arc::new(
        RouteTable::standard().expect("FATAL: the built-in route table is malformed"),
    );

    // 4. Session collaborator.
    let session_source: SessionSourceState = match config.session_backend {
        SessionBackend::Remote => Arc::new(
            HttpSessionSource::new(&config.api_base_url, SESSION_API_TIMEOUT)
                .expect("FATAL: failed to build the session API client"),
        ),
        SessionBackend::Jwt => Arc::new(JwtSessionSource::new(&config.jwt_secret)),
    };
    tracing::info!(backend = ?config.session_backend, "session collaborator ready");

    // 5. Session cache and its periodic refresh.
    let sessions = Arc::new(SessionStore::new());
    spawn_refresh_task(
        sessions.clone(),
        session_source.clone(),
        config.session_refresh,
    );

    // 6. Router and server.
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        routes,
        sessions,
        session_source,
        config,
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: failed to bind the listen address. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API documentation (Swagger UI) at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly");
}

use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    routing::{get, post},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Session resolution and its collaborators.
pub mod auth;
pub mod config;
pub mod errors;
pub mod models;
pub mod session;

// Route access resolution: the static table and the pure decision over it.
pub mod resolver;
pub mod routes;

// HTTP surface: JSON endpoints and the page-navigation fallback.
pub mod handlers;
pub mod shell;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use resolver::{ResolutionOutcome, home_for, resolve};
pub use routes::RouteTable;
pub use session::{MockSessionSource, SessionSourceState, SessionStore, SessionStoreState};

/// The shared, immutable route table.
pub type RouteTableState = Arc<RouteTable>;

/// ApiDoc
///
/// OpenAPI document for the shell's JSON endpoints, served at
/// `/api-docs/openapi.json`. Page navigations are not part of it.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::get_session, handlers::logout,
        handlers::resolve_navigation
    ),
    components(
        schemas(
            models::Session, models::Role, models::Page, models::Layout,
            models::NavigationResponse,
        )
    ),
    tags(
        (name = "lab-portal", description = "Lab Portal navigation shell API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request may need, cloned cheaply into each handler.
#[derive(Clone)]
pub struct AppState {
    /// Immutable route configuration, loaded once at startup.
    pub routes: RouteTableState,
    /// Server-side cache of authenticated sessions.
    pub sessions: SessionStoreState,
    /// External collaborator answering "who holds this token?".
    pub session_source: SessionSourceState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RouteTableState {
    fn from_ref(app_state: &AppState) -> RouteTableState {
        app_state.routes.clone()
    }
}

impl FromRef<AppState> for SessionStoreState {
    fn from_ref(app_state: &AppState) -> SessionStoreState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for SessionSourceState {
    fn from_ref(app_state: &AppState) -> SessionSourceState {
        app_state.session_source.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the JSON endpoints, the Swagger UI and the page-navigation
/// fallback, then wraps everything in the request-id and tracing layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health))
        .route("/api/session", get(handlers::get_session))
        .route("/api/session/logout", post(handlers::logout))
        .route("/api/navigation/resolve", get(handlers::resolve_navigation))
        // Any other GET is a page navigation; other methods get 405.
        .fallback(get(shell::navigate))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the `http_request` span with method, URI and the request id so every
/// log line of one navigation correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    RouteTableState,
    auth::{self, CurrentSession},
    config::AppConfig,
    errors::ShellError,
    models::{NavigationResponse, Session},
    resolver,
    session::{SessionSourceState, SessionStoreState},
};

/// ResolveQuery
///
/// Query parameters of `GET /api/navigation/resolve`.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ResolveQuery {
    /// Absolute path the client router is about to show, e.g. `/task-detail/42`.
    pub path: Option<String>,
}

/// health
///
/// [Public Route] Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Alive", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

/// get_session
///
/// [Any Session] The session the shell sees for this request. Anonymous
/// requests get `{"authenticated": false, "role": "unauthenticated"}`.
#[utoipa::path(
    get,
    path = "/api/session",
    responses((status = 200, description = "Current session", body = Session))
)]
pub async fn get_session(CurrentSession { session, .. }: CurrentSession) -> Json<Session> {
    Json(session)
}

/// logout
///
/// [Any Session] Drops the cached session for the request's token and expires
/// the session cookie. Idempotent: logging out twice, or without a session,
/// still answers 204.
#[utoipa::path(
    post,
    path = "/api/session/logout",
    responses((status = 204, description = "Signed out"))
)]
pub async fn logout(
    State(store): State<SessionStoreState>,
    State(source): State<SessionSourceState>,
    State(config): State<AppConfig>,
    CurrentSession { token, .. }: CurrentSession,
) -> impl IntoResponse {
    if let Some(token) = token {
        store.logout(&token, source.as_ref()).await;
    }
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, auth::expired_cookie(&config.session_cookie))],
    )
}

/// resolve_navigation
///
/// [Any Session] Route access resolution for the client-side router: the same
/// decision the page fallback applies, returned as data. Redirects carry
/// `replace: true`.
#[utoipa::path(
    get,
    path = "/api/navigation/resolve",
    params(ResolveQuery),
    responses(
        (status = 200, description = "Resolution outcome", body = NavigationResponse),
        (status = 400, description = "Missing or relative path")
    )
)]
pub async fn resolve_navigation(
    State(routes): State<RouteTableState>,
    CurrentSession { session, .. }: CurrentSession,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<NavigationResponse>, ShellError> {
    let path = query.path.ok_or(ShellError::MissingPath)?;
    if !path.starts_with('/') {
        return Err(ShellError::RelativePath(path));
    }

    let outcome = resolver::resolve(&session, &routes, &path);
    tracing::debug!(%path, role = %session.role(), ?outcome, "client navigation resolved");
    Ok(Json(outcome.into()))
}

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use lab_portal::{
    AppConfig, AppState, MockSessionSource, RouteTable, SessionStore, create_router,
    config::Env,
    models::{Layout, NavigationResponse, Page, Role, Session},
    routes::CatchAll,
};
use std::sync::Arc;
use tower::util::ServiceExt;

// --- Test Scaffolding ---

fn app_with(table: RouteTable, config: AppConfig, source: MockSessionSource) -> axum::Router {
    let state = AppState {
        routes: Arc::new(table),
        sessions: Arc::new(SessionStore::new()),
        session_source: Arc::new(source),
        config,
    };
    create_router(state)
}

fn app() -> axum::Router {
    let source = MockSessionSource::new()
        .with("admin-token", Ok(Session::authenticated(Role::Admin)))
        .with("staff-token", Ok(Session::authenticated(Role::TechnicalStaff)))
        .with("student-token", Ok(Session::authenticated(Role::Student)));
    app_with(RouteTable::standard().unwrap(), AppConfig::default(), source)
}

fn page(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn page_as(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, format!("lab_session={token}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

// --- Page Navigations ---

#[tokio::test]
async fn test_anonymous_visitor_gets_login_page() {
    let response = app().oneshot(page("/auth/login")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains(r#"data-page="Login""#));
    assert!(html.contains(r#"data-layout="none""#));
    assert!(html.contains(r#"id="notification-popup""#));
    assert!(html.contains(r#"id="logout-confirm-popup""#));
}

#[tokio::test]
async fn test_signed_in_admin_is_bounced_off_login() {
    let response = app()
        .oneshot(page_as("/auth/login", "admin-token"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn test_student_without_task_role_goes_to_schedule() {
    let response = app().oneshot(page_as("/task", "student-token")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/schedule");
}

#[tokio::test]
async fn test_technical_staff_sees_task_board() {
    let response = app().oneshot(page_as("/task", "staff-token")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains(r#"data-page="Task""#));
    assert!(html.contains(r#"data-layout="default""#));
}

#[tokio::test]
async fn test_anonymous_on_admin_page_goes_to_schedule_then_login() {
    let app = app();

    let first = app.clone().oneshot(page("/management/user")).await.unwrap();
    assert_eq!(first.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&first), "/schedule");

    let second = app.oneshot(page("/schedule")).await.unwrap();
    assert_eq!(second.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&second), "/auth/login");
}

#[tokio::test]
async fn test_admin_sees_user_management() {
    let response = app()
        .oneshot(page_as("/management/user", "admin-token"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains(r#"data-page="User""#));
}

#[tokio::test]
async fn test_bearer_token_is_accepted_for_page_requests() {
    let request = Request::builder()
        .uri("/dashboard")
        .header(header::AUTHORIZATION, "Bearer admin-token")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unmatched_path_goes_to_login_even_when_signed_in() {
    let response = app()
        .oneshot(page_as("/dashbord", "admin-token"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login");
}

#[tokio::test]
async fn test_not_found_catch_all_answers_404() {
    let table = RouteTable::standard().unwrap().with_catch_all(CatchAll::NotFound);
    let app = app_with(table, AppConfig::default(), MockSessionSource::new());

    let response = app.oneshot(page("/nowhere")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_get_navigation_is_rejected() {
    let request = Request::builder()
        .method("DELETE")
        .uri("/task")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let response = app().oneshot(page("/auth/login")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

// --- Local Role Header ---

#[tokio::test]
async fn test_local_role_header_stands_in_for_a_session() {
    let config = AppConfig {
        dev_role_header: true,
        ..AppConfig::default()
    };
    let app = app_with(RouteTable::standard().unwrap(), config, MockSessionSource::new());
    let request = Request::builder()
        .uri("/report-detail/12")
        .header("x-user-role", "hod")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains(r#"data-page="ReportDetail""#));
    assert!(html.contains(r#"data-param-reportId="12""#));
}

#[tokio::test]
async fn test_role_header_is_ignored_unless_switched_on() {
    // Local environment, flag left at its default.
    let request = Request::builder()
        .uri("/dashboard")
        .header("x-user-role", "admin")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login");
}

#[tokio::test]
async fn test_role_header_is_ignored_in_production() {
    let config = AppConfig {
        env: Env::Production,
        dev_role_header: true,
        ..AppConfig::default()
    };
    let app = app_with(RouteTable::standard().unwrap(), config, MockSessionSource::new());
    let request = Request::builder()
        .uri("/dashboard")
        .header("x-user-role", "admin")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login");
}

// --- Client Router Endpoint ---

async fn resolve_json(app: axum::Router, request: Request<Body>) -> NavigationResponse {
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_resolve_endpoint_renders_with_params() {
    let outcome = resolve_json(
        app(),
        page_as("/api/navigation/resolve?path=/task-detail/88", "staff-token"),
    )
    .await;

    match outcome {
        NavigationResponse::Render {
            page,
            layout,
            params,
        } => {
            assert_eq!(page, Page::TaskDetail);
            assert_eq!(layout, Layout::Default);
            assert_eq!(params.get("taskId").map(String::as_str), Some("88"));
        }
        other => panic!("expected render, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resolve_endpoint_redirects_with_replace() {
    let outcome = resolve_json(
        app(),
        page_as("/api/navigation/resolve?path=/dashboard", "student-token"),
    )
    .await;

    assert_eq!(
        outcome,
        NavigationResponse::Redirect {
            to: "/schedule".to_string(),
            replace: true
        }
    );
}

#[tokio::test]
async fn test_resolve_endpoint_requires_an_absolute_path() {
    let missing = app()
        .oneshot(page("/api/navigation/resolve"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let relative = app()
        .oneshot(page("/api/navigation/resolve?path=task"))
        .await
        .unwrap();
    assert_eq!(relative.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&body_string(relative).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("absolute"));
}

#[tokio::test]
async fn test_health_check() {
    let response = app().oneshot(page("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

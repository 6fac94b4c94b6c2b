use std::fmt::Write as _;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::{
    auth::CurrentSession,
    models::{Layout, Page},
    resolver::{self, ResolutionOutcome},
    routes::RouteParams,
    RouteTableState,
};

/// Element ids of the dialogs mounted once per document, outside the routed page.
pub const NOTIFICATION_POPUP_ID: &str = "notification-popup";
pub const LOGOUT_CONFIRM_POPUP_ID: &str = "logout-confirm-popup";

/// navigate
///
/// [Fallback Route] Every `GET` the router does not claim is a page navigation.
/// The path is resolved against the route table and the outcome applied:
/// - `Render`: 200 with the mount document for the page and layout.
/// - `RedirectTo`: 303 See Other, so the browser replaces the entry instead of
///   stacking guard hops in its history.
/// - `NotFound`: 404.
pub async fn navigate(
    State(routes): State<RouteTableState>,
    CurrentSession { session, .. }: CurrentSession,
    uri: Uri,
) -> Response {
    let outcome = resolver::resolve(&session, &routes, uri.path());
    tracing::debug!(
        path = uri.path(),
        role = %session.role(),
        authenticated = session.is_authenticated(),
        ?outcome,
        "navigation resolved"
    );

    match outcome {
        ResolutionOutcome::Render {
            page,
            layout,
            params,
        } => Html(mount_document(page, layout, &params)).into_response(),
        ResolutionOutcome::RedirectTo(path) => Redirect::to(path).into_response(),
        ResolutionOutcome::NotFound => (StatusCode::NOT_FOUND, Html(not_found_document())).into_response(),
    }
}

/// mount_document
///
/// The HTML the client bundle hydrates: a root element naming the page, its
/// layout and captured route parameters, followed by the two session-wide
/// dialogs, which do not depend on the route.
pub fn mount_document(page: Page, layout: Layout, params: &RouteParams) -> String {
    let mut root = format!(
        r#"<div id="app" data-page="{}" data-layout="{}""#,
        page.as_str(),
        layout.as_str()
    );
    for (name, value) in params {
        // Writing to a String cannot fail.
        let _ = write!(root, r#" data-param-{}="{}""#, escape_html(name), escape_html(value));
    }
    root.push_str("></div>");

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Lab Portal</title>\n<script type=\"module\" src=\"/assets/app.js\"></script>\n\
         </head>\n<body>\n{root}\n{}\n{}\n</body>\n</html>\n",
        dialog(NOTIFICATION_POPUP_ID),
        dialog(LOGOUT_CONFIRM_POPUP_ID),
    )
}

fn dialog(id: &str) -> String {
    format!(r#"<div id="{id}" data-singleton="true" hidden></div>"#)
}

fn not_found_document() -> String {
    "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
     <title>Not Found</title>\n</head>\n<body>\n<p>Page not found.</p>\n</body>\n</html>\n"
        .to_string()
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_document_names_page_layout_and_params() {
        let mut params = RouteParams::new();
        params.insert("taskId".to_string(), "17".to_string());

        let html = mount_document(Page::TaskDetail, Layout::Default, &params);

        assert!(html.contains(r#"data-page="TaskDetail""#));
        assert!(html.contains(r#"data-layout="default""#));
        assert!(html.contains(r#"data-param-taskId="17""#));
    }

    #[test]
    fn dialogs_are_mounted_once_outside_the_page() {
        let html = mount_document(Page::Login, Layout::None, &RouteParams::new());
        let root_end = html.find("></div>").unwrap();

        for id in [NOTIFICATION_POPUP_ID, LOGOUT_CONFIRM_POPUP_ID] {
            let needle = format!(r#"id="{id}""#);
            assert_eq!(html.matches(&needle).count(), 1);
            assert!(html.find(&needle).unwrap() > root_end);
        }
    }

    #[test]
    fn route_params_are_escaped() {
        let mut params = RouteParams::new();
        params.insert("reportId".to_string(), r#""><script>x</script>"#.to_string());

        let html = mount_document(Page::ReportDetail, Layout::Default, &params);

        assert!(!html.contains("<script>x"));
        assert!(html.contains("&quot;&gt;&lt;script&gt;"));
    }
}

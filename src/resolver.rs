use crate::{
    models::{Layout, NavigationResponse, Page, Role, Session},
    routes::{CatchAll, LOGIN_PATH, RouteClass, RouteParams, RouteTable},
};

/// ResolutionOutcome
///
/// The single answer produced for one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Render {
        page: Page,
        layout: Layout,
        params: RouteParams,
    },
    RedirectTo(&'static str),
    NotFound,
}

impl From<ResolutionOutcome> for NavigationResponse {
    fn from(outcome: ResolutionOutcome) -> Self {
        match outcome {
            ResolutionOutcome::Render {
                page,
                layout,
                params,
            } => NavigationResponse::Render {
                page,
                layout,
                params,
            },
            ResolutionOutcome::RedirectTo(to) => NavigationResponse::Redirect {
                to: to.to_string(),
                replace: true,
            },
            ResolutionOutcome::NotFound => NavigationResponse::NotFound,
        }
    }
}

/// home_for
///
/// The landing page of a role: where a session goes when the page it asked for
/// is not one it may see. Total over `Role`.
pub const fn home_for(role: Role) -> &'static str {
    match role {
        Role::Admin => "/dashboard",
        Role::TechnicalStaff => "/task",
        Role::Instructor | Role::Hod | Role::Student | Role::User | Role::Unauthenticated => {
            "/schedule"
        }
    }
}

/// resolve
///
/// Decides what a navigation to `path` produces for `session`. The families
/// are consulted in order (public, protected, admin-only), the first matching
/// descriptor of the first family that matches decides, and the table's
/// catch-all applies when nothing matches.
///
/// Pure: no I/O, no shared state, same inputs give the same outcome.
pub fn resolve(session: &Session, table: &RouteTable, path: &str) -> ResolutionOutcome {
    let role = session.role();

    if let Some((descriptor, params)) = table.first_match(RouteClass::Public, path) {
        return if session.is_authenticated() {
            ResolutionOutcome::RedirectTo(home_for(role))
        } else {
            render(descriptor.page, descriptor.layout, params)
        };
    }

    if let Some((descriptor, params)) = table.first_match(RouteClass::Protected, path) {
        return if !session.is_authenticated() {
            ResolutionOutcome::RedirectTo(LOGIN_PATH)
        } else if !descriptor.permits(role) {
            ResolutionOutcome::RedirectTo(home_for(role))
        } else {
            render(descriptor.page, descriptor.layout, params)
        };
    }

    if let Some((descriptor, params)) = table.first_match(RouteClass::AdminOnly, path) {
        // Anonymous visitors fall through to the anonymous home path here, not to
        // the login page directly.
        return if session.is_authenticated() && role == Role::Admin {
            render(descriptor.page, descriptor.layout, params)
        } else {
            ResolutionOutcome::RedirectTo(home_for(role))
        };
    }

    match table.catch_all() {
        CatchAll::RedirectToLogin => ResolutionOutcome::RedirectTo(LOGIN_PATH),
        CatchAll::NotFound => ResolutionOutcome::NotFound,
    }
}

fn render(page: Page, layout: Layout, params: RouteParams) -> ResolutionOutcome {
    ResolutionOutcome::Render {
        page,
        layout,
        params,
    }
}

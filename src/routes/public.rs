use crate::models::Page;
use crate::routes::RouteDescriptor;

/// Public Route Family
///
/// Pages that only an **anonymous** visitor may see. A signed-in session that
/// lands on any of these is bounced to its role's home path, so a logged-in
/// user never sees the login form again.
///
/// Public pages render without the application chrome (`Layout::None`).
pub fn routes() -> Vec<RouteDescriptor> {
    vec![
        // /auth/login
        // Credential form. The session collaborator issues the session cookie
        // after a successful sign-in; the shell only decides who may see it.
        RouteDescriptor::public("/auth/login", Page::Login),
    ]
}

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Identity ---

/// Role
///
/// The single role a session holds. Determines which protected routes render
/// and which home path a redirect falls back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    Admin,
    Instructor,
    /// Head of department.
    Hod,
    TechnicalStaff,
    Student,
    User,
    Unauthenticated,
}

impl Role {
    /// Every role, in declaration order. Used to check that per-role mappings stay total.
    pub const ALL: [Role; 7] = [
        Role::Admin,
        Role::Instructor,
        Role::Hod,
        Role::TechnicalStaff,
        Role::Student,
        Role::User,
        Role::Unauthenticated,
    ];

    /// The wire name used in JSON bodies, token claims and collaborator responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Hod => "hod",
            Role::TechnicalStaff => "technical_staff",
            Role::Student => "student",
            Role::User => "user",
            Role::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role `{0}`")]
pub struct RoleParseError(pub String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RoleParseError(s.to_string()))
    }
}

/// Session
///
/// A snapshot of who is behind a request. Only two shapes exist: the anonymous
/// session (`authenticated = false`, role `Unauthenticated`) and an
/// authenticated session carrying a real role. The constructors keep that
/// invariant, so the fields stay private.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct Session {
    authenticated: bool,
    role: Role,
}

impl Session {
    pub const fn anonymous() -> Self {
        Self {
            authenticated: false,
            role: Role::Unauthenticated,
        }
    }

    /// Authenticated session for `role`. `Role::Unauthenticated` collapses to the
    /// anonymous session.
    pub const fn authenticated(role: Role) -> Self {
        match role {
            Role::Unauthenticated => Self::anonymous(),
            role => Self {
                authenticated: true,
                role,
            },
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[derive(Deserialize)]
struct SessionRepr {
    authenticated: bool,
    #[serde(default)]
    role: Option<Role>,
}

impl<'de> Deserialize<'de> for Session {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let repr = SessionRepr::deserialize(deserializer)?;
        Ok(match (repr.authenticated, repr.role) {
            (true, Some(role)) => Session::authenticated(role),
            _ => Session::anonymous(),
        })
    }
}

// --- Rendering Collaborators ---

/// Page
///
/// Identifies the page component the client bundle mounts. The shell never
/// looks inside a page; it only hands the identity back in a render outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Page {
    Login,
    Dashboard,
    Task,
    TaskDetail,
    Schedule,
    Report,
    ReportDetail,
    Profile,
    Lab,
    Device,
    Software,
    Document,
    Class,
    Department,
    User,
}

impl Page {
    pub fn as_str(&self) -> &'static str {
        match self {
            Page::Login => "Login",
            Page::Dashboard => "Dashboard",
            Page::Task => "Task",
            Page::TaskDetail => "TaskDetail",
            Page::Schedule => "Schedule",
            Page::Report => "Report",
            Page::ReportDetail => "ReportDetail",
            Page::Profile => "Profile",
            Page::Lab => "Lab",
            Page::Device => "Device",
            Page::Software => "Software",
            Page::Document => "Document",
            Page::Class => "Class",
            Page::Department => "Department",
            Page::User => "User",
        }
    }
}

/// Layout
///
/// The frame a page is mounted in. `None` renders the page bare (login),
/// `Default` wraps it in the sidebar and header chrome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Layout {
    None,
    Default,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::None => "none",
            Layout::Default => "default",
        }
    }
}

// --- Response Schemas (Output) ---

/// NavigationResponse
///
/// Output schema of `GET /api/navigation/resolve`, consumed by the client-side
/// router. Redirects always ask the client to replace the current history entry
/// so back-navigation cannot loop through a guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
#[ts(export)]
pub enum NavigationResponse {
    Render {
        page: Page,
        layout: Layout,
        params: BTreeMap<String, String>,
    },
    Redirect {
        to: String,
        replace: bool,
    },
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_wire_name() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
            assert_eq!(
                serde_json::to_value(role).unwrap(),
                serde_json::Value::String(role.as_str().to_string())
            );
        }
    }

    #[test]
    fn role_parse_is_case_insensitive_and_rejects_unknown() {
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" Technical_Staff ".parse::<Role>(), Ok(Role::TechnicalStaff));
        assert_eq!(
            "janitor".parse::<Role>(),
            Err(RoleParseError("janitor".to_string()))
        );
    }

    #[test]
    fn unauthenticated_role_never_yields_an_authenticated_session() {
        let session = Session::authenticated(Role::Unauthenticated);
        assert!(!session.is_authenticated());
        assert_eq!(session, Session::anonymous());
    }

    #[test]
    fn session_deserialization_normalizes_inconsistent_shapes() {
        let s: Session = serde_json::from_str(r#"{"authenticated":false,"role":"admin"}"#).unwrap();
        assert_eq!(s, Session::anonymous());

        let s: Session = serde_json::from_str(r#"{"authenticated":true}"#).unwrap();
        assert_eq!(s, Session::anonymous());

        let s: Session = serde_json::from_str(r#"{"authenticated":true,"role":"hod"}"#).unwrap();
        assert_eq!(s, Session::authenticated(Role::Hod));
    }

    #[test]
    fn navigation_response_is_tagged_by_outcome() {
        let json = serde_json::to_value(NavigationResponse::Redirect {
            to: "/schedule".to_string(),
            replace: true,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"outcome": "redirect", "to": "/schedule", "replace": true})
        );

        let json = serde_json::to_value(NavigationResponse::NotFound).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "not_found"}));
    }
}

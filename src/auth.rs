use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    models::{Role, Session},
    session::{SessionSourceState, SessionStoreState},
};

/// Header that, in `Env::Local` with `AUTH_DEV_BYPASS` set, stands in for a real session.
pub const LOCAL_ROLE_HEADER: &str = "x-user-role";

/// Claims
///
/// Payload of the signed session tokens the portal API mints.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the account id.
    pub sub: Uuid,
    /// Wire name of the account's role, e.g. `technical_staff`.
    pub role: String,
    /// Expiration Time (exp).
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// bearer_token
///
/// The token of an `Authorization: Bearer <token>` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// cookie_token
///
/// The value of the cookie called `name`, searched across every `Cookie` header.
pub fn cookie_token(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// session_token
///
/// Bearer header first (API clients), then the session cookie (browser navigations).
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers, cookie_name))
}

/// Set-Cookie value that makes the browser drop the session cookie.
pub fn expired_cookie(cookie_name: &str) -> String {
    format!("{cookie_name}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

/// CurrentSession Extractor Result
///
/// The session behind a request, plus the token it was resolved from (none
/// for anonymous requests and for the local role header).
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub session: Session,
    pub token: Option<String>,
}

/// CurrentSession Extractor Implementation
///
/// Never rejects: a request without a usable token is simply anonymous, and
/// the resolver turns that into the right redirect.
///
/// 1. Local Bypass: in `Env::Local` with `dev_role_header` switched on, a
///    parsable `x-user-role` header wins.
/// 2. Token Extraction: bearer header, then session cookie.
/// 3. Store Lookup: cached session, or one collaborator call on a miss.
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
    SessionStoreState: FromRef<S>,
    SessionSourceState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local && config.dev_role_header {
            let role = parts
                .headers
                .get(LOCAL_ROLE_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<Role>().ok());
            if let Some(role) = role {
                return Ok(CurrentSession {
                    session: Session::authenticated(role),
                    token: None,
                });
            }
        }

        let Some(token) = session_token(&parts.headers, &config.session_cookie) else {
            return Ok(CurrentSession {
                session: Session::anonymous(),
                token: None,
            });
        };

        let store = SessionStoreState::from_ref(state);
        let source = SessionSourceState::from_ref(state);
        let session = store.resolve(&token, source.as_ref()).await;

        Ok(CurrentSession {
            session,
            token: Some(token),
        })
    }
}

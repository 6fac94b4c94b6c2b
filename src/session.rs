use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex as StdMutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
    time::MissedTickBehavior,
};

use crate::{
    auth::Claims,
    models::{Role, Session},
};

// 1. Session Collaborator Contract

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionFetchError {
    /// The collaborator could not give a definite answer (5xx, network, timeout).
    /// A cached session must survive this.
    #[error("session lookup failed transiently: {0}")]
    Transient(String),
}

/// SessionSource
///
/// Answers "who holds this token?". `Ok(Session::anonymous())` is a definite
/// "not signed in" and clears any cached session; `Err(Transient)` leaves the
/// cache untouched so a flaky network never forces a logout.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn fetch_session(&self, token: &str) -> Result<Session, SessionFetchError>;

    /// When `token` stops being accepted on its own, if the source can tell.
    /// Logout keeps a revocation at least until then.
    fn token_expiry(&self, _token: &str) -> Option<DateTime<Utc>> {
        None
    }
}

/// SessionSourceState
///
/// The shared handle stored in the application state.
pub type SessionSourceState = Arc<dyn SessionSource>;

// 2. Remote Implementation (portal REST API)

/// Body of `GET {api}/auth/session`. The role stays a string so an unknown
/// role degrades to anonymous instead of failing the whole lookup.
#[derive(Debug, Deserialize)]
struct SessionPayload {
    authenticated: bool,
    #[serde(default)]
    role: Option<String>,
}

/// HttpSessionSource
///
/// Asks the portal's REST API about a bearer token.
#[derive(Clone)]
pub struct HttpSessionSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSessionSource {
    pub fn new(api_base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/auth/session", api_base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl SessionSource for HttpSessionSource {
    async fn fetch_session(&self, token: &str) -> Result<Session, SessionFetchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SessionFetchError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(SessionFetchError::Transient(format!("session API answered {status}")));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(Session::anonymous());
        }
        if !status.is_success() {
            tracing::debug!(%status, "session API rejected token");
            return Ok(Session::anonymous());
        }

        // A body we cannot read says nothing definite about the session.
        let payload = response
            .json::<SessionPayload>()
            .await
            .map_err(|e| SessionFetchError::Transient(e.to_string()))?;

        Ok(session_from_payload(payload))
    }
}

fn session_from_payload(payload: SessionPayload) -> Session {
    if !payload.authenticated {
        return Session::anonymous();
    }
    match payload.role.as_deref().map(str::parse::<Role>) {
        Some(Ok(role)) => Session::authenticated(role),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "session API returned an unknown role");
            Session::anonymous()
        }
        None => Session::anonymous(),
    }
}

// 3. Local Implementation (signed tokens)

/// JwtSessionSource
///
/// Verifies HS256 session tokens minted by the API with a shared secret. Any
/// validation failure (bad signature, expiry, unknown role) is a definite
/// "not signed in"; this source never fails transiently.
#[derive(Clone)]
pub struct JwtSessionSource {
    key: DecodingKey,
    validation: Validation,
}

impl JwtSessionSource {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl SessionSource for JwtSessionSource {
    async fn fetch_session(&self, token: &str) -> Result<Session, SessionFetchError> {
        let claims = match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, "session token rejected");
                return Ok(Session::anonymous());
            }
        };

        match claims.role.parse::<Role>() {
            Ok(role) => Ok(Session::authenticated(role)),
            Err(e) => {
                tracing::warn!(sub = %claims.sub, error = %e, "session token carries an unknown role");
                Ok(Session::anonymous())
            }
        }
    }

    /// The `exp` claim of a correctly signed token, whether or not it has
    /// already passed.
    fn token_expiry(&self, token: &str) -> Option<DateTime<Utc>> {
        let mut validation = self.validation.clone();
        validation.validate_exp = false;
        let claims = decode::<Claims>(token, &self.key, &validation).ok()?.claims;
        DateTime::from_timestamp(i64::try_from(claims.exp).ok()?, 0)
    }
}

// 4. Mock Implementation (for tests)

/// MockSessionSource
///
/// Scripted answers per token; unknown tokens are anonymous. Counts calls so
/// tests can assert on cache hits.
#[derive(Default)]
pub struct MockSessionSource {
    answers: Mutex<HashMap<String, Result<Session, SessionFetchError>>>,
    expiries: HashMap<String, DateTime<Utc>>,
    calls: AtomicUsize,
}

impl MockSessionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, token: &str, answer: Result<Session, SessionFetchError>) -> Self {
        self.answers.get_mut().insert(token.to_string(), answer);
        self
    }

    pub fn with_expiry(mut self, token: &str, expires_at: DateTime<Utc>) -> Self {
        self.expiries.insert(token.to_string(), expires_at);
        self
    }

    pub async fn set(&self, token: &str, answer: Result<Session, SessionFetchError>) {
        self.answers.lock().await.insert(token.to_string(), answer);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionSource for MockSessionSource {
    async fn fetch_session(&self, token: &str) -> Result<Session, SessionFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .await
            .get(token)
            .cloned()
            .unwrap_or(Ok(Session::anonymous()))
    }

    fn token_expiry(&self, token: &str) -> Option<DateTime<Utc>> {
        self.expiries.get(token).copied()
    }
}

// 5. Session Store

/// How long a logged-out token is remembered when its source cannot say when
/// the token expires on its own.
const DEFAULT_REVOCATION_RETENTION_HOURS: i64 = 24;

/// Upper bound on collaborator lookups a refresh cycle keeps in flight.
const REFRESH_CONCURRENCY: usize = 8;

/// SessionEntry
///
/// One cached authenticated session. `epoch` changes on every write; a refresh
/// result is only applied to the epoch it was fetched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub session: Session,
    pub epoch: u64,
    pub refreshed_at: DateTime<Utc>,
}

/// What happened to a cached entry when a refresh result arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    /// The collaborator said the token is no longer signed in.
    Cleared,
    /// Transient failure; the cached session was kept.
    Preserved,
    /// The entry was logged out or rewritten while the fetch was in flight.
    Discarded,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub updated: usize,
    pub cleared: usize,
    pub preserved: usize,
    pub discarded: usize,
}

impl RefreshReport {
    fn record(&mut self, outcome: RefreshOutcome) {
        match outcome {
            RefreshOutcome::Updated => self.updated += 1,
            RefreshOutcome::Cleared => self.cleared += 1,
            RefreshOutcome::Preserved => self.preserved += 1,
            RefreshOutcome::Discarded => self.discarded += 1,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<String, SessionEntry>,
    /// Revoked token -> the moment the revocation may be forgotten.
    revoked: HashMap<String, DateTime<Utc>>,
    next_epoch: u64,
}

impl StoreInner {
    fn stamp(&mut self) -> u64 {
        self.next_epoch += 1;
        self.next_epoch
    }
}

/// First lookups currently waiting on the collaborator, per token.
///
/// Kept behind a blocking mutex so the guard can unregister on drop, which
/// also covers a request future cancelled mid-fetch.
#[derive(Default)]
struct InFlight(StdMutex<HashMap<String, usize>>);

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn contains(&self, token: &str) -> bool {
        self.lock().contains_key(token)
    }

    fn enter<'a>(&'a self, token: &str) -> LookupGuard<'a> {
        *self.lock().entry(token.to_string()).or_default() += 1;
        LookupGuard {
            in_flight: self,
            token: token.to_string(),
        }
    }
}

struct LookupGuard<'a> {
    in_flight: &'a InFlight,
    token: String,
}

impl Drop for LookupGuard<'_> {
    fn drop(&mut self) {
        let mut lookups = self.in_flight.lock();
        if let Some(count) = lookups.get_mut(&self.token) {
            *count -= 1;
            if *count == 0 {
                lookups.remove(&self.token);
            }
        }
    }
}

/// SessionStore
///
/// Server-side cache of authenticated sessions keyed by token. Requests read
/// snapshots from it; the refresh task and logout write to it.
pub struct SessionStore {
    inner: RwLock<StoreInner>,
    in_flight: InFlight,
    revocation_retention: chrono::Duration,
}

/// SessionStoreState
///
/// The shared handle stored in the application state.
pub type SessionStoreState = Arc<SessionStore>;

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_revocation_retention(chrono::Duration::hours(
            DEFAULT_REVOCATION_RETENTION_HOURS,
        ))
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that forgets a revocation `retention` after logout, or when the
    /// token itself expires if that is later.
    pub fn with_revocation_retention(retention: chrono::Duration) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            in_flight: InFlight::default(),
            revocation_retention: retention,
        }
    }

    pub async fn entry(&self, token: &str) -> Option<SessionEntry> {
        self.inner.read().await.entries.get(token).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    pub async fn is_revoked(&self, token: &str) -> bool {
        self.inner.read().await.revoked.contains_key(token)
    }

    pub async fn revoked_len(&self) -> usize {
        self.inner.read().await.revoked.len()
    }

    /// resolve
    ///
    /// The session behind `token`. Cached sessions are returned as is; on a miss
    /// the collaborator is asked and an authenticated answer is cached. Revoked
    /// tokens and transient failures yield the anonymous session.
    pub async fn resolve(&self, token: &str, source: &dyn SessionSource) -> Session {
        {
            let inner = self.inner.read().await;
            if inner.revoked.contains_key(token) {
                return Session::anonymous();
            }
            if let Some(entry) = inner.entries.get(token) {
                return entry.session;
            }
        }

        // Registered until the write below is done, so a logout racing the
        // fetch knows to revoke the token.
        let _lookup = self.in_flight.enter(token);

        let session = match source.fetch_session(token).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "session lookup failed; serving request as anonymous");
                return Session::anonymous();
            }
        };
        if !session.is_authenticated() {
            return session;
        }

        let mut inner = self.inner.write().await;
        if inner.revoked.contains_key(token) {
            return Session::anonymous();
        }
        if let Some(entry) = inner.entries.get(token) {
            // A concurrent lookup got there first.
            return entry.session;
        }
        let epoch = inner.stamp();
        inner.entries.insert(
            token.to_string(),
            SessionEntry {
                session,
                epoch,
                refreshed_at: Utc::now(),
            },
        );
        tracing::debug!(role = %session.role(), epoch, "session cached");
        session
    }

    /// logout
    ///
    /// Drops the cached session. A token that was cached or has a first lookup
    /// in flight is also revoked, so neither that lookup nor a late refresh can
    /// bring it back. The revocation lasts until the token expires (as reported
    /// by `source`) or the retention window ends, whichever is later. Tokens the
    /// store never saw leave no trace. Returns whether a session was cached.
    pub async fn logout(&self, token: &str, source: &dyn SessionSource) -> bool {
        let mut inner = self.inner.write().await;
        let removed = inner.entries.remove(token).is_some();
        if !removed && !self.in_flight.contains(token) {
            return false;
        }

        let retained_until = Utc::now() + self.revocation_retention;
        let forget_at = match source.token_expiry(token) {
            Some(expiry) => expiry.max(retained_until),
            None => retained_until,
        };
        inner.revoked.insert(token.to_string(), forget_at);
        if removed {
            tracing::info!("session cleared on logout");
        }
        removed
    }

    /// Forgets revocations whose deadline has passed.
    pub async fn prune_revoked(&self) -> usize {
        let mut inner = self.inner.write().await;
        prune_revoked(&mut inner.revoked, Utc::now())
    }

    /// apply_refresh
    ///
    /// Applies a collaborator answer fetched against `expected_epoch`. Stale
    /// answers are discarded; transient failures keep the cached session.
    pub async fn apply_refresh(
        &self,
        token: &str,
        expected_epoch: u64,
        result: Result<Session, SessionFetchError>,
    ) -> RefreshOutcome {
        let mut inner = self.inner.write().await;
        match inner.entries.get(token) {
            Some(entry) if entry.epoch == expected_epoch => {}
            _ => return RefreshOutcome::Discarded,
        }

        match result {
            Ok(session) if session.is_authenticated() => {
                let epoch = inner.stamp();
                if let Some(entry) = inner.entries.get_mut(token) {
                    entry.session = session;
                    entry.epoch = epoch;
                    entry.refreshed_at = Utc::now();
                }
                RefreshOutcome::Updated
            }
            Ok(_) => {
                inner.entries.remove(token);
                tracing::info!("session cleared: collaborator reports it is no longer signed in");
                RefreshOutcome::Cleared
            }
            Err(e) => {
                tracing::warn!(error = %e, "session refresh failed; keeping cached session");
                RefreshOutcome::Preserved
            }
        }
    }

    /// refresh_all
    ///
    /// Re-asks the collaborator about every cached authenticated session, at
    /// most `REFRESH_CONCURRENCY` at a time. The lock is not held across the
    /// fetches.
    pub async fn refresh_all(&self, source: &dyn SessionSource) -> RefreshReport {
        let pending: Vec<(String, u64)> = {
            let inner = self.inner.read().await;
            inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.session.is_authenticated())
                .map(|(token, entry)| (token.clone(), entry.epoch))
                .collect()
        };

        stream::iter(pending)
            .map(move |(token, epoch)| async move {
                let result = source.fetch_session(&token).await;
                self.apply_refresh(&token, epoch, result).await
            })
            .buffer_unordered(REFRESH_CONCURRENCY)
            .fold(RefreshReport::default(), |mut report, outcome| async move {
                report.record(outcome);
                report
            })
            .await
    }
}

/// Drops revocations due at or before `now`; returns how many were dropped.
fn prune_revoked(revoked: &mut HashMap<String, DateTime<Utc>>, now: DateTime<Utc>) -> usize {
    let before = revoked.len();
    revoked.retain(|_, forget_at| *forget_at > now);
    before - revoked.len()
}

/// spawn_refresh_task
///
/// Every `period`, forgets expired revocations and re-validates cached
/// sessions, for as long as the runtime lives.
pub fn spawn_refresh_task(
    store: SessionStoreState,
    source: SessionSourceState,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let pruned = store.prune_revoked().await;
            if pruned > 0 {
                tracing::debug!(pruned, "expired revocations forgotten");
            }
            if store.is_empty().await {
                continue;
            }
            let report = store.refresh_all(source.as_ref()).await;
            tracing::debug!(
                updated = report.updated,
                cleared = report.cleared,
                preserved = report.preserved,
                discarded = report.discarded,
                "session refresh cycle finished"
            );
        }
    })
}

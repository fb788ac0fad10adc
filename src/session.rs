//! Cookie-keyed, in-memory session storage
//!
//! Each request copies its [`SessionData`] out of the store, works on the
//! copy, and hands it back through [`SessionStore::save`]. Only the fields the
//! request changed are written back, so overlapping requests on one session
//! do not undo each other. Entries idle for longer than the TTL are dropped,
//! and the store never holds more than its configured number of sessions.
//! Nothing is kept across process restarts.

use axum::http::header::{HeaderValue, COOKIE};
use axum::http::HeaderMap;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

use crate::auth::StoredCredentials;
use crate::error::{GmailError, Result};

/// Idle time after which a session is forgotten (24 hours)
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on concurrently stored sessions
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Per-user state carried between requests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    /// CSRF state of an OAuth flow in progress
    pub oauth_state: Option<String>,
    pub credentials: Option<StoredCredentials>,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        self.oauth_state.is_none() && self.credentials.is_none()
    }
}

/// A session loaded for the duration of one request
#[derive(Debug)]
pub struct SessionContext {
    id: Uuid,
    is_new: bool,
    loaded: SessionData,
    pub data: SessionData,
}

impl SessionContext {
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn is_modified(&self) -> bool {
        self.data != self.loaded
    }
}

#[derive(Debug)]
struct StoredSession {
    data: SessionData,
    last_seen: Instant,
}

pub struct SessionStore {
    sessions: DashMap<Uuid, StoredSession>,
    cookie_name: String,
    secure: bool,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(cookie_name: impl Into<String>, secure: bool) -> Self {
        Self {
            sessions: DashMap::new(),
            cookie_name: cookie_name.into(),
            secure,
            ttl: DEFAULT_SESSION_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    /// Override the idle TTL and the session cap
    pub fn with_limits(mut self, ttl: Duration, max_sessions: usize) -> Self {
        self.ttl = ttl;
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Session named by the request's cookie, or a fresh one
    pub fn load(&self, headers: &HeaderMap) -> SessionContext {
        self.load_at(headers, Instant::now())
    }

    fn load_at(&self, headers: &HeaderMap, now: Instant) -> SessionContext {
        if let Some(id) = session_id_from_headers(headers, &self.cookie_name) {
            let found = self.sessions.get(&id).map(|stored| {
                (stored.data.clone(), self.is_expired(stored.last_seen, now))
            });

            match found {
                Some((data, false)) => {
                    debug!(
                        "Loaded session (oauth_state: {}, credentials: {})",
                        data.oauth_state.is_some(),
                        data.credentials.is_some()
                    );
                    return SessionContext {
                        id,
                        is_new: false,
                        loaded: data.clone(),
                        data,
                    };
                }
                Some((_, true)) => {
                    debug!("Session cookie refers to an expired session, starting a new one");
                    self.sessions.remove(&id);
                }
                None => {
                    debug!("Session cookie refers to unknown session, starting a new one");
                }
            }
        }

        SessionContext {
            id: Uuid::new_v4(),
            is_new: true,
            loaded: SessionData::default(),
            data: SessionData::default(),
        }
    }

    /// Store the session back
    ///
    /// Returns the `Set-Cookie` value to send when the session is new. A new
    /// session that holds nothing is dropped without setting a cookie. For
    /// an existing session only the fields changed since [`load`](Self::load)
    /// are written.
    pub fn save(&self, context: SessionContext) -> Result<Option<HeaderValue>> {
        self.save_at(context, Instant::now())
    }

    fn save_at(&self, context: SessionContext, now: Instant) -> Result<Option<HeaderValue>> {
        if context.is_new {
            if context.data.is_empty() {
                return Ok(None);
            }
            self.insert(context.id, context.data, now);
            return self.cookie_header(context.id).map(Some);
        }

        let modified = context.is_modified();
        let SessionContext {
            id, loaded, data, ..
        } = context;

        let refreshed = match self.sessions.get_mut(&id) {
            Some(mut stored) => {
                stored.last_seen = now;
                if data.oauth_state != loaded.oauth_state {
                    stored.data.oauth_state = data.oauth_state.clone();
                }
                if data.credentials != loaded.credentials {
                    stored.data.credentials = data.credentials.clone();
                }
                true
            }
            None => false,
        };

        // Evicted while the request ran; keep what this request produced
        if !refreshed && modified && !data.is_empty() {
            self.insert(id, data, now);
        }

        Ok(None)
    }

    /// Drop every session idle for longer than the TTL
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, stored| !self.is_expired(stored.last_seen, now));
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            debug!("Purged {} expired sessions", purged);
        }
        purged
    }

    fn insert(&self, id: Uuid, data: SessionData, now: Instant) {
        if self.sessions.len() >= self.max_sessions {
            self.purge_expired_at(now);
        }
        while self.sessions.len() >= self.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|entry| entry.value().last_seen)
                .map(|entry| *entry.key());
            match oldest {
                Some(oldest) => {
                    debug!("Session store full, evicting least recently used session");
                    self.sessions.remove(&oldest);
                }
                None => break,
            }
        }

        self.sessions.insert(
            id,
            StoredSession {
                data,
                last_seen: now,
            },
        );
    }

    fn is_expired(&self, last_seen: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_seen) > self.ttl
    }

    fn cookie_header(&self, id: Uuid) -> Result<HeaderValue> {
        let secure = if self.secure { "; Secure" } else { "" };
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax{}",
            self.cookie_name, id, secure
        );
        HeaderValue::from_str(&cookie)
            .map_err(|e| GmailError::ConfigError(format!("Invalid session cookie: {}", e)))
    }
}

/// Extract the session id from the `Cookie` headers
fn session_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    /// Store a session holding only an OAuth state and return its cookie header
    fn pending_session(store: &SessionStore, state: &str, now: Instant) -> HeaderMap {
        let mut context = store.load_at(&HeaderMap::new(), now);
        let id = context.id();
        context.data.oauth_state = Some(state.to_string());
        store.save_at(context, now).unwrap();
        headers_with_cookie(&format!("{}={}", store.cookie_name(), id))
    }

    #[test]
    fn test_new_empty_session_is_not_stored() {
        let store = SessionStore::new("sid", false);
        let context = store.load(&HeaderMap::new());
        let cookie = store.save(context).unwrap();
        assert!(cookie.is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_new_session_sets_cookie() {
        let store = SessionStore::new("sid", false);
        let mut context = store.load(&HeaderMap::new());
        let id = context.id();
        context.data.oauth_state = Some("xyz".to_string());

        let cookie = store.save(context).unwrap().unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with(&format!("sid={}", id)));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_secure_cookie_flag() {
        let store = SessionStore::new("sid", true);
        let mut context = store.load(&HeaderMap::new());
        context.data.oauth_state = Some("xyz".to_string());
        let cookie = store.save(context).unwrap().unwrap();
        assert!(cookie.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_existing_session_round_trip() {
        let store = SessionStore::new("sid", false);
        let headers = pending_session(&store, "state-1", Instant::now());

        let mut loaded = store.load(&headers);
        assert_eq!(loaded.data.oauth_state.as_deref(), Some("state-1"));

        loaded.data.oauth_state = None;
        loaded.data.credentials = Some(StoredCredentials::new("token", None, None));
        // Known session: no cookie needs to be re-sent
        assert!(store.save(loaded).unwrap().is_none());

        let reloaded = store.load(&headers);
        assert!(reloaded.data.oauth_state.is_none());
        assert!(reloaded.data.credentials.is_some());
    }

    #[test]
    fn test_unchanged_snapshot_does_not_overwrite_newer_save() {
        let store = SessionStore::new("sid", false);
        let headers = pending_session(&store, "state-1", Instant::now());

        // A slow request holds a snapshot taken before the login completed
        let stale = store.load(&headers);

        let mut callback = store.load(&headers);
        callback.data.oauth_state = None;
        callback.data.credentials = Some(StoredCredentials::new("fresh", None, None));
        store.save(callback).unwrap();

        store.save(stale).unwrap();

        let current = store.load(&headers);
        assert!(current.data.oauth_state.is_none());
        assert_eq!(current.data.credentials.unwrap().access_token, "fresh");
    }

    #[test]
    fn test_overlapping_saves_merge_changed_fields() {
        let store = SessionStore::new("sid", false);
        let headers = pending_session(&store, "state-1", Instant::now());

        let mut refresher = store.load(&headers);
        let mut login = store.load(&headers);

        refresher.data.credentials = Some(StoredCredentials::new("refreshed", None, None));
        login.data.oauth_state = Some("state-2".to_string());

        store.save(refresher).unwrap();
        store.save(login).unwrap();

        let current = store.load(&headers);
        assert_eq!(current.data.oauth_state.as_deref(), Some("state-2"));
        assert_eq!(current.data.credentials.unwrap().access_token, "refreshed");
    }

    #[test]
    fn test_expired_session_is_not_loaded() {
        let store = SessionStore::new("sid", false).with_limits(Duration::from_secs(60), 10);
        let start = Instant::now();
        let headers = pending_session(&store, "state-1", start);

        let still_fresh = store.load_at(&headers, start + Duration::from_secs(30));
        assert_eq!(still_fresh.data.oauth_state.as_deref(), Some("state-1"));

        let expired = store.load_at(&headers, start + Duration::from_secs(61));
        assert!(expired.data.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_saving_refreshes_last_seen() {
        let store = SessionStore::new("sid", false).with_limits(Duration::from_secs(60), 10);
        let start = Instant::now();
        let headers = pending_session(&store, "state-1", start);

        let touched = store.load_at(&headers, start + Duration::from_secs(50));
        store
            .save_at(touched, start + Duration::from_secs(50))
            .unwrap();

        let later = store.load_at(&headers, start + Duration::from_secs(100));
        assert_eq!(later.data.oauth_state.as_deref(), Some("state-1"));
    }

    #[test]
    fn test_purge_expired_drops_idle_sessions() {
        let store = SessionStore::new("sid", false).with_limits(Duration::from_secs(60), 100);
        let start = Instant::now();
        for i in 0..5 {
            pending_session(&store, &format!("old-{}", i), start);
        }
        let recent = start + Duration::from_secs(45);
        for i in 0..3 {
            pending_session(&store, &format!("new-{}", i), recent);
        }
        assert_eq!(store.len(), 8);

        let purged = store.purge_expired_at(start + Duration::from_secs(90));
        assert_eq!(purged, 5);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_store_never_exceeds_cap() {
        let store = SessionStore::new("sid", false).with_limits(DEFAULT_SESSION_TTL, 50);
        let start = Instant::now();
        for i in 0..499u64 {
            pending_session(&store, &format!("state-{}", i), start + Duration::from_millis(i));
            assert!(store.len() <= 50);
        }
        let last = pending_session(&store, "state-499", start + Duration::from_millis(499));
        assert_eq!(store.len(), 50);

        // The newest session survives eviction
        let newest = store.load_at(&last, start + Duration::from_secs(1));
        assert_eq!(newest.data.oauth_state.as_deref(), Some("state-499"));
    }

    #[test]
    fn test_unknown_or_malformed_cookie_starts_new_session() {
        let store = SessionStore::new("sid", false);

        let unknown = store.load(&headers_with_cookie(&format!("sid={}", Uuid::new_v4())));
        assert!(unknown.data.is_empty());

        let malformed = store.load(&headers_with_cookie("sid=not-a-uuid"));
        assert!(malformed.data.is_empty());
    }

    #[test]
    fn test_session_id_from_headers() {
        let id = Uuid::new_v4();
        let headers = headers_with_cookie(&format!("sid = {} ; x=y", id));
        // Names must match exactly; whitespace around the pair is ignored
        assert_eq!(session_id_from_headers(&headers, "sid"), None);

        let headers = headers_with_cookie(&format!("x=y;sid={}", id));
        assert_eq!(session_id_from_headers(&headers, "sid"), Some(id));
        assert_eq!(session_id_from_headers(&headers, "other"), None);
    }
}

//! Session store: the single live login credential of a bridge instance.
//!
//! One mutex guards every accessor. Readers get a clone, never a reference
//! into the store, so nobody can observe a half-written session. Sessions are
//! kept in memory only.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{QqMusicError, Result};

/// A confirmed login credential.
///
/// Invariant: when `uin` is set, `cookie` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(skip_serializing_if = "Option::is_none")]
    uin: Option<String>,
    cookie: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Build a session, rejecting a `uin` without a cookie.
    pub fn new(
        uin: Option<String>,
        cookie: impl Into<String>,
        token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let cookie = cookie.into();
        if uin.is_some() && cookie.trim().is_empty() {
            return Err(QqMusicError::Parse("session has uin but no cookie".into()));
        }
        Ok(Self {
            uin,
            cookie,
            token,
            expires_at,
        })
    }

    pub fn uin(&self) -> Option<&str> {
        self.uin.as_deref()
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether `now` is at or past `expires_at`. No expiry means never.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Holds at most one [`Session`].
#[derive(Debug, Default)]
pub struct SessionStore {
    slot: Mutex<Option<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the live session.
    pub fn set(&self, session: Session) {
        *self.lock() = Some(session);
    }

    /// Snapshot of the live session.
    pub fn get(&self) -> Option<Session> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// `false` when there is no session.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.lock().as_ref().is_some_and(|s| s.is_expired(now))
    }

    /// Cookie of the live, unexpired session.
    pub fn cookie_for_request(&self, now: DateTime<Utc>) -> Option<String> {
        let guard = self.lock();
        let session = guard.as_ref()?;
        if session.is_expired(now) {
            tracing::debug!("stored session expired, sending request without cookie");
            return None;
        }
        Some(session.cookie.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        // Poisoned: a writer panicked mid-update. Fatal.
        if let Ok(guard) = self.slot.lock() {
            guard
        } else {
            tracing::error!("session store lock poisoned, aborting");
            std::process::abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn uin_requires_cookie() {
        assert!(Session::new(Some("100".into()), "", None, None).is_err());
        assert!(Session::new(None, "", None, None).is_ok());
        assert!(Session::new(Some("100".into()), "skey=1", None, None).is_ok());
    }

    #[test]
    fn get_returns_a_snapshot() {
        let store = SessionStore::new();
        assert!(store.get().is_none());
        store.set(Session::new(Some("1".into()), "c1", None, None).unwrap());
        let snap = store.get().unwrap();
        store.set(Session::new(Some("2".into()), "c2", None, None).unwrap());
        assert_eq!(snap.cookie(), "c1");
        assert_eq!(store.get().unwrap().uin(), Some("2"));
        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn expiry_is_checked_against_supplied_clock() {
        let now = Utc::now();
        let store = SessionStore::new();
        assert!(!store.is_expired(now));

        store.set(Session::new(None, "c", None, None).unwrap());
        assert!(!store.is_expired(now + Duration::days(3650)));

        store.set(Session::new(None, "c", None, Some(now + Duration::seconds(10))).unwrap());
        assert!(!store.is_expired(now));
        assert!(store.is_expired(now + Duration::seconds(10)));
        assert_eq!(store.cookie_for_request(now).as_deref(), Some("c"));
        assert_eq!(store.cookie_for_request(now + Duration::seconds(11)), None);
    }
}

//! The bridge instance: one relay, one session store, one login slot.
//!
//! Resolver and login operations are implemented in separate modules
//! (`login`, `playlist`, `track`, `search`, `media`, `user`) as
//! `impl QqMusicClient` blocks.
//!
//! # musicu requests
//!
//! Most resolvers go through the `musicu.fcg` gateway, which takes one JSON
//! body naming a module and method:
//!
//! ```json
//! {
//!   "comm": { "ct": 24, "cv": 0, "g_tk": 5381, "uin": 0, "format": "json" },
//!   "req":  { "module": "...", "method": "...", "param": { ... } }
//! }
//! ```
//!
//! and answers `{ "code": 0, "req": { "code": 0, "data": { ... } } }`.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::config::BridgeConfig;
use crate::endpoint::Operation;
use crate::error::{QqMusicError, Result};
use crate::login::LoginAttempt;
use crate::relay::{Params, Relay};
use crate::session::SessionStore;
use crate::sign::{cookie_value, g_tk};
use crate::wire::MusicuResp;

/// Blocking client for the QQ Music upstream.
///
/// Resolver calls only take a snapshot of the session store and may run
/// concurrently. Login calls (`start_login`, `poll_login`, `cancel_login`,
/// `logout`) serialize on the login lock.
pub struct QqMusicClient {
    pub(crate) relay: Relay,
    pub(crate) store: Arc<SessionStore>,
    pub(crate) login: Mutex<Option<LoginAttempt>>,
    pub(crate) config: BridgeConfig,
}

impl QqMusicClient {
    /// Create a client with configuration from the environment.
    pub fn new() -> Result<Self> {
        Self::with_config(BridgeConfig::from_env()?)
    }

    /// Create a client with an explicit configuration (tests, hosts that
    /// configure programmatically).
    pub fn with_config(config: BridgeConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(SessionStore::new()))
    }

    /// Create a client sharing an existing session store.
    pub fn with_store(config: BridgeConfig, store: Arc<SessionStore>) -> Result<Self> {
        let relay = Relay::new(config.relay.clone())?;
        Ok(Self {
            relay,
            store,
            login: Mutex::new(None),
            config,
        })
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Cookie for an outbound request: the caller's, else the stored one.
    pub(crate) fn effective_cookie(&self, explicit: Option<&str>) -> Option<String> {
        match explicit.map(str::trim).filter(|c| !c.is_empty()) {
            Some(c) => Some(c.to_owned()),
            None => self.store.cookie_for_request(Utc::now()),
        }
    }

    /// Error for restricted content: `SessionExpired` when a credential was
    /// sent (or the stored one lapsed), `AuthRequired` otherwise.
    pub(crate) fn restricted(&self, cookie: Option<&str>) -> QqMusicError {
        if cookie.is_some() || self.store.is_expired(Utc::now()) {
            QqMusicError::SessionExpired
        } else {
            QqMusicError::AuthRequired
        }
    }

    /// Call one musicu module/method and return its `data`.
    ///
    /// A non-zero `req.code` is an [`QqMusicError::Upstream`]; a success
    /// without `data` is a [`QqMusicError::Parse`].
    pub(crate) fn musicu<T: DeserializeOwned>(
        &self,
        module: &str,
        method: &str,
        param: Value,
        cookie: Option<&str>,
    ) -> Result<T> {
        let uin = cookie
            .and_then(|c| cookie_value(c, "uin"))
            .map_or_else(|| "0".to_owned(), normalize_uin);
        let body = json!({
            "comm": {
                "ct": 24,
                "cv": 0,
                "g_tk": g_tk(cookie),
                "uin": uin,
                "format": "json",
                "platform": "yqq.json",
            },
            "req": { "module": module, "method": method, "param": param },
        });
        let params = Params::new().json(body);
        let resp: MusicuResp<T> = self.relay.call_json(Operation::Musicu, &params, cookie)?;
        if resp.req.code != 0 {
            return Err(QqMusicError::Upstream {
                code: resp.req.code,
                message: resp.req.msg.unwrap_or_else(|| format!("{module}.{method} failed")),
            });
        }
        resp.req
            .data
            .ok_or_else(|| QqMusicError::Parse(format!("{module}.{method}: missing data")))
    }
}

/// `o0012345` → `12345`.
pub(crate) fn normalize_uin(raw: &str) -> String {
    let digits = raw.trim().trim_start_matches(['o', 'O']).trim_start_matches('0');
    if digits.is_empty() { "0".to_owned() } else { digits.to_owned() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uin_cookie_forms_are_normalized() {
        assert_eq!(normalize_uin("o0012345"), "12345");
        assert_eq!(normalize_uin("100"), "100");
        assert_eq!(normalize_uin("o000"), "0");
    }
}

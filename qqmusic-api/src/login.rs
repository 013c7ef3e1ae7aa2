//! QR-code login state machine.
//!
//! ```text
//! Created     --(QR image fetched)----------------------> WaitingScan
//! WaitingScan --(66 waiting)----------------------------> WaitingScan
//! WaitingScan --(67 scanned)----------------------------> Scanned
//! WaitingScan --(65 expired)----------------------------> Expired
//! Scanned     --(0 confirmed, uin + cookie present)-----> Confirmed
//! Scanned     --(65 expired / 68 denied)----------------> Failed
//! WaitingScan/Scanned --(network or parse error)--------> Failed
//! ```
//!
//! `Confirmed`, `Expired` and `Failed` are terminal: polling them returns the
//! same snapshot without touching the upstream. `start_login` always replaces
//! whatever attempt came before and clears the stored session.
//!
//! # Upstream
//!
//! - `GET /ptqrshow`: PNG image; the correlation cookie `qrsig` arrives in
//!   `Set-Cookie`.
//! - `GET /ptqrlogin?ptqrtoken=hash33(qrsig)` with `Cookie: qrsig=...`:
//!   answers `ptuiCB('<code>','0','<redirect url>','0','<message>','<nick>')`.
//!   On code `0` the credential cookies arrive in `Set-Cookie` and the
//!   redirect URL carries `uin` and `ptsigx`.

use std::sync::MutexGuard;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine, engine::general_purpose::STANDARD as B64};
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use serde::ser::{Serialize, Serializer};
use uuid::Uuid;

use crate::client::{QqMusicClient, normalize_uin};
use crate::endpoint::Operation;
use crate::error::{QqMusicError, Result};
use crate::relay::{Classified, Params, Reply};
use crate::session::Session;
use crate::sign::hash33;

const APP_ID: &str = "716027609";
const DAID: &str = "383";
const THIRD_AID: &str = "100497308";

/// Displayable QR code: image bytes, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub mime: String,
    pub base64: String,
}

/// Phase of a login attempt. Only `Confirmed` carries a session and only
/// `Failed` carries an error.
#[derive(Debug, Clone)]
pub enum LoginPhase {
    Created,
    WaitingScan,
    Scanned,
    Confirmed(Session),
    Expired,
    Failed(QqMusicError),
}

impl LoginPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::WaitingScan => "WaitingScan",
            Self::Scanned => "Scanned",
            Self::Confirmed(_) => "Confirmed",
            Self::Expired => "Expired",
            Self::Failed(_) => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed(_) | Self::Expired | Self::Failed(_))
    }
}

/// Snapshot of a login attempt, as returned to callers.
#[derive(Debug, Clone)]
pub struct QrLoginState {
    /// Bridge-issued correlation key, passed back to `poll_login`.
    pub key: String,
    pub qr_payload: Option<QrPayload>,
    pub phase: LoginPhase,
}

impl QrLoginState {
    pub fn session(&self) -> Option<&Session> {
        match &self.phase {
            LoginPhase::Confirmed(s) => Some(s),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&QqMusicError> {
        match &self.phase {
            LoginPhase::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl Serialize for QrLoginState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct View<'a> {
            key: &'a str,
            state: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            qr_payload: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            mime: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            uin: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            cookie: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            token: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            expires_at: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<String>,
        }

        let session = self.session();
        View {
            key: &self.key,
            state: self.phase.name(),
            qr_payload: self.qr_payload.as_ref().map(|q| q.base64.as_str()),
            mime: self.qr_payload.as_ref().map(|q| q.mime.as_str()),
            uin: session.and_then(Session::uin),
            cookie: session.map(Session::cookie),
            token: session.and_then(Session::token),
            expires_at: session
                .and_then(Session::expires_at)
                .map(|t| t.to_rfc3339()),
            error: self.error().map(ToString::to_string),
        }
        .serialize(serializer)
    }
}

/// In-flight login attempt held by the client.
#[derive(Debug)]
pub(crate) struct LoginAttempt {
    state: QrLoginState,
    qrsig: Option<String>,
}

/// Upstream QR status, decoded from one `ptqrlogin` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum QrStatus {
    Waiting,
    Scanned,
    Expired,
    Denied,
    Confirmed {
        uin: Option<String>,
        cookie: String,
        token: Option<String>,
    },
    Other {
        code: String,
        message: String,
    },
}

impl QqMusicClient {
    /// Begin a new QR login, superseding any previous attempt. The stored
    /// session is cleared before the QR code is fetched.
    ///
    /// Lands in `WaitingScan` with the QR image, or in `Failed` with the
    /// upstream error when the image could not be fetched.
    pub fn start_login(&self) -> QrLoginState {
        let mut slot = self.lock_login();
        self.store.clear();
        let key = Uuid::new_v4().simple().to_string();
        tracing::info!(%key, "login created");
        let mut attempt = LoginAttempt {
            state: QrLoginState {
                key,
                qr_payload: None,
                phase: LoginPhase::Created,
            },
            qrsig: None,
        };

        match self.fetch_qr() {
            Ok((qrsig, payload)) => {
                attempt.qrsig = Some(qrsig);
                attempt.state.qr_payload = Some(payload);
                attempt.state.phase = LoginPhase::WaitingScan;
            }
            Err(e) => {
                tracing::warn!(error = %e, "QR code fetch failed");
                attempt.state.phase = LoginPhase::Failed(e);
            }
        }

        let snapshot = attempt.state.clone();
        *slot = Some(attempt);
        snapshot
    }

    /// Advance the attempt identified by `key` by one upstream status check.
    ///
    /// # Errors
    ///
    /// [`QqMusicError::InvalidKey`] when `key` is not the current attempt's
    /// key. Upstream failures do not error: they move the attempt to
    /// `Failed`.
    pub fn poll_login(&self, key: &str) -> Result<QrLoginState> {
        let mut slot = self.lock_login();
        let attempt = slot
            .as_mut()
            .filter(|a| a.state.key == key)
            .ok_or_else(|| QqMusicError::InvalidKey(key.to_owned()))?;

        if attempt.state.phase.is_terminal() {
            return Ok(attempt.state.clone());
        }

        let next = match attempt.qrsig.as_deref() {
            None => Some(LoginPhase::Failed(QqMusicError::Parse(
                "login attempt has no QR signature".into(),
            ))),
            Some(qrsig) => match self.check_qr(qrsig) {
                Ok(status) => self.advance(&attempt.state.phase, status),
                Err(e) => Some(LoginPhase::Failed(e)),
            },
        };

        if let Some(phase) = next {
            if let LoginPhase::Confirmed(session) = &phase {
                self.store.set(session.clone());
            }
            tracing::info!(
                key,
                from = attempt.state.phase.name(),
                to = phase.name(),
                "login transition"
            );
            attempt.state.phase = phase;
        }
        Ok(attempt.state.clone())
    }

    /// Drop the in-flight attempt. A confirmed session stays in the store.
    pub fn cancel_login(&self) {
        if self.lock_login().take().is_some() {
            tracing::info!("login cancelled");
        }
    }

    /// Clear the session store and any login attempt.
    pub fn logout(&self) {
        self.lock_login().take();
        self.store.clear();
        tracing::info!("logged out");
    }

    /// Snapshot of the current attempt without polling.
    pub fn login_state(&self) -> Option<QrLoginState> {
        self.lock_login().as_ref().map(|a| a.state.clone())
    }

    /// Next phase for `status` observed in `current`; `None` keeps it.
    fn advance(&self, current: &LoginPhase, status: QrStatus) -> Option<LoginPhase> {
        match (current, status) {
            (LoginPhase::WaitingScan, QrStatus::Scanned) => Some(LoginPhase::Scanned),
            (LoginPhase::WaitingScan, QrStatus::Expired) => Some(LoginPhase::Expired),
            (LoginPhase::Scanned, QrStatus::Expired) => {
                Some(LoginPhase::Failed(QqMusicError::Upstream {
                    code: 65,
                    message: "QR code expired before confirmation".into(),
                }))
            }
            (_, QrStatus::Denied) => Some(LoginPhase::Failed(QqMusicError::Upstream {
                code: 68,
                message: "login denied on device".into(),
            })),
            (_, QrStatus::Confirmed { uin, cookie, token }) => {
                let expires_at = self
                    .config
                    .session_ttl
                    .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
                    .map(|ttl| Utc::now() + ttl);
                let phase = match uin {
                    Some(uin) if !cookie.is_empty() => {
                        match Session::new(Some(uin), cookie, token, expires_at) {
                            Ok(session) => LoginPhase::Confirmed(session),
                            Err(e) => LoginPhase::Failed(e),
                        }
                    }
                    _ => LoginPhase::Failed(QqMusicError::Parse(
                        "login confirmed without uin or cookie".into(),
                    )),
                };
                Some(phase)
            }
            (_, QrStatus::Other { code, message }) => {
                tracing::debug!(%code, %message, "unrecognized QR status, state unchanged");
                None
            }
            _ => None,
        }
    }

    fn fetch_qr(&self) -> Result<(String, QrPayload)> {
        let params = Params::new()
            .query("appid", APP_ID)
            .query("e", 2)
            .query("l", "M")
            .query("s", 3)
            .query("d", 72)
            .query("v", 4)
            .query("t", rand::random::<f64>())
            .query("daid", DAID)
            .query("pt_3rd_aid", THIRD_AID);
        self.relay
            .call(Operation::QrShow, &params, None, |reply| {
                let Some(qrsig) = reply.cookie("qrsig") else {
                    return Classified::Unusable("missing qrsig cookie".into());
                };
                if reply.body.is_empty() {
                    return Classified::Unusable("empty QR image".into());
                }
                let mime = reply
                    .headers
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .filter(|v| v.starts_with("image/"))
                    .unwrap_or("image/png")
                    .to_owned();
                Classified::Usable((
                    qrsig,
                    QrPayload {
                        mime,
                        base64: B64.encode(&reply.body),
                    },
                ))
            })
    }

    fn check_qr(&self, qrsig: &str) -> Result<QrStatus> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let params = Params::new()
            .query("u1", "https://graph.qq.com/oauth2.0/login_jump")
            .query("ptqrtoken", hash33(qrsig, 0))
            .query("ptredirect", 0)
            .query("h", 1)
            .query("t", 1)
            .query("g", 1)
            .query("from_ui", 1)
            .query("ptlang", 2052)
            .query("action", format!("0-0-{now_ms}"))
            .query("js_ver", 20_102_616)
            .query("js_type", 1)
            .query("pt_uistyle", 40)
            .query("aid", APP_ID)
            .query("daid", DAID)
            .query("pt_3rd_aid", THIRD_AID)
            .query("has_onekey", 1);
        let cookie = format!("qrsig={qrsig}");
        self.relay
            .call(Operation::QrPoll, &params, Some(&cookie), |reply| {
                match parse_status(&reply) {
                    Some(status) => Classified::Usable(status),
                    None => Classified::Unusable("missing ptuiCB payload".into()),
                }
            })
    }

    fn lock_login(&self) -> MutexGuard<'_, Option<LoginAttempt>> {
        if let Ok(guard) = self.login.lock() {
            guard
        } else {
            tracing::error!("login state lock poisoned, aborting");
            std::process::abort();
        }
    }
}

/// Decode a `ptqrlogin` reply into a [`QrStatus`].
fn parse_status(reply: &Reply) -> Option<QrStatus> {
    let args = ptui_args(&reply.text())?;
    let code = args.first()?.trim().to_owned();
    let status = match code.as_str() {
        "66" => QrStatus::Waiting,
        "67" => QrStatus::Scanned,
        "65" => QrStatus::Expired,
        "68" => QrStatus::Denied,
        "0" => {
            let redirect = args.get(2).and_then(|u| reqwest::Url::parse(u).ok());
            let query = |name: &str| {
                redirect.as_ref().and_then(|u| {
                    u.query_pairs()
                        .find(|(k, v)| k == name && !v.is_empty())
                        .map(|(_, v)| v.into_owned())
                })
            };
            let uin = query("uin")
                .or_else(|| reply.cookie("uin"))
                .map(|u| normalize_uin(&u));
            let cookie = reply
                .set_cookies()
                .into_iter()
                .filter(|(_, v)| !v.is_empty())
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            let token = query("ptsigx").or_else(|| reply.cookie("p_skey"));
            QrStatus::Confirmed { uin, cookie, token }
        }
        _ => QrStatus::Other {
            message: args.get(4).cloned().unwrap_or_default(),
            code,
        },
    };
    Some(status)
}

/// Single-quoted arguments of `ptuiCB(...)`.
fn ptui_args(text: &str) -> Option<Vec<String>> {
    let start = text.find("ptuiCB(")? + "ptuiCB(".len();
    let end = text.rfind(')')?;
    if end < start {
        return None;
    }
    let mut args = Vec::new();
    let mut in_quote = false;
    let mut buf = String::new();
    for c in text[start..end].chars() {
        if c == '\'' {
            if in_quote {
                args.push(std::mem::take(&mut buf));
            }
            in_quote = !in_quote;
        } else if in_quote {
            buf.push(c);
        }
    }
    (!args.is_empty()).then_some(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};

    fn reply(body: &str, cookies: &[&'static str]) -> Reply {
        let mut headers = HeaderMap::new();
        for c in cookies {
            headers.append(SET_COOKIE, HeaderValue::from_static(*c));
        }
        Reply {
            status: StatusCode::OK,
            headers,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn ptui_arguments_are_split_on_quotes() {
        let args = ptui_args("ptuiCB('66','0','','0','二维码未失效。(1, 2)', '')").unwrap();
        assert_eq!(args.len(), 6);
        assert_eq!(args[0], "66");
        assert_eq!(args[4], "二维码未失效。(1, 2)");
        assert!(ptui_args("<html></html>").is_none());
    }

    #[test]
    fn status_codes_map_to_states() {
        for (code, expected) in [
            ("66", QrStatus::Waiting),
            ("67", QrStatus::Scanned),
            ("65", QrStatus::Expired),
            ("68", QrStatus::Denied),
        ] {
            let body = format!("ptuiCB('{code}','0','','0','msg', '')");
            assert_eq!(parse_status(&reply(&body, &[])), Some(expected));
        }
    }

    #[test]
    fn confirmed_status_collects_credentials() {
        let body = "ptuiCB('0','0','https://ssl.ptlogin2.graph.qq.com/check_sig?pttype=1&uin=100&service=ptqrlogin&ptsigx=sig1&s_url=x','0','ok', 'nick')";
        let r = reply(body, &["skey=@c1; Path=/", "superkey=; Path=/", "p_skey=ps; Path=/"]);
        assert_eq!(
            parse_status(&r),
            Some(QrStatus::Confirmed {
                uin: Some("100".into()),
                cookie: "skey=@c1; p_skey=ps".into(),
                token: Some("sig1".into()),
            })
        );
    }

    #[test]
    fn confirmed_uin_falls_back_to_cookie() {
        let r = reply("ptuiCB('0','0','','0','ok', '')", &["uin=o0100; Path=/"]);
        let Some(QrStatus::Confirmed { uin, cookie, token }) = parse_status(&r) else {
            panic!("expected confirmed");
        };
        assert_eq!(uin.as_deref(), Some("100"));
        assert_eq!(cookie, "uin=o0100");
        assert_eq!(token, None);
    }

    #[test]
    fn terminal_phases() {
        assert!(LoginPhase::Expired.is_terminal());
        assert!(LoginPhase::Failed(QqMusicError::AuthRequired).is_terminal());
        assert!(!LoginPhase::Scanned.is_terminal());
        assert!(!LoginPhase::Created.is_terminal());
    }
}

//! Relay client: calls an operation's endpoints in order until one of them
//! yields a usable response.
//!
//! Per endpoint:
//!
//! 1. Send the request with the per-attempt timeout.
//! 2. Transport failure (connect/reset/timeout, HTTP 5xx) → retry the same
//!    endpoint up to `retries_per_endpoint` more times, then move on.
//! 3. HTTP 4xx → unusable, move on without retrying.
//! 4. Otherwise hand the reply to the caller's classifier:
//!    - [`Classified::Usable`] → done
//!    - [`Classified::Unusable`] → move on (malformed payload)
//!    - [`Classified::Failed`] → return the error immediately
//!
//! When every endpoint is exhausted the result is
//! [`QqMusicError::AllEndpointsFailed`] carrying the last failure per endpoint.

use std::borrow::Cow;

use reqwest::blocking::Client;
use reqwest::header::{COOKIE, HeaderMap, SET_COOKIE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::RelayConfig;
use crate::endpoint::{Endpoint, Operation};
use crate::error::{EndpointFailure, FailureKind, QqMusicError, Result};

/// Request parameters shared by every endpoint of an operation.
#[derive(Debug, Clone, Default)]
pub struct Params {
    /// Values for `{name}` placeholders in URL templates.
    pub path: Vec<(&'static str, String)>,
    pub query: Vec<(&'static str, String)>,
    /// JSON request body (sent for POST endpoints).
    pub json: Option<Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn path(mut self, name: &'static str, value: impl ToString) -> Self {
        self.path.push((name, value.to_string()));
        self
    }

    #[must_use]
    pub fn query(mut self, name: &'static str, value: impl ToString) -> Self {
        self.query.push((name, value.to_string()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }
}

/// A raw upstream reply handed to a classifier.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// `(name, value)` pairs from every `Set-Cookie` header, in order.
    pub fn set_cookies(&self) -> Vec<(String, String)> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|raw| {
                let pair = raw.split(';').next()?;
                let (name, value) = pair.split_once('=')?;
                Some((name.trim().to_owned(), value.trim().to_owned()))
            })
            .collect()
    }

    /// Value of the `Set-Cookie` named `name`, if present and non-empty.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.set_cookies()
            .into_iter()
            .find(|(n, v)| n == name && !v.is_empty())
            .map(|(_, v)| v)
    }
}

/// Verdict of an operation-specific classifier on one reply.
#[derive(Debug)]
pub enum Classified<T> {
    Usable(T),
    /// Malformed or otherwise unusable; try the next endpoint.
    Unusable(String),
    /// Well-formed upstream error; stop and surface it.
    Failed(QqMusicError),
}

/// Blocking relay over a fixed endpoint table.
pub struct Relay {
    http: Client,
    config: RelayConfig,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Result<Self> {
        let http = Client::builder().build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Run `op` through its fallback chain, classifying each reply with
    /// `classify`. `cookie` is attached as the `Cookie` header and not kept.
    pub fn call<T>(
        &self,
        op: Operation,
        params: &Params,
        cookie: Option<&str>,
        mut classify: impl FnMut(Reply) -> Classified<T>,
    ) -> Result<T> {
        let endpoints = self.config.endpoints.get(op);
        let max_attempts = self.config.retries_per_endpoint.saturating_add(1);
        let mut failures = Vec::with_capacity(endpoints.len());

        for (index, endpoint) in endpoints.iter().enumerate() {
            let mut attempt = 0;
            let failure = loop {
                attempt += 1;
                let (kind, message) = match self.send(endpoint, params, cookie) {
                    Err(e) => (FailureKind::Transport, e.to_string()),
                    Ok(reply) if reply.status.is_server_error() => {
                        (FailureKind::Transport, format!("HTTP {}", reply.status))
                    }
                    Ok(reply) if !reply.status.is_success() => {
                        (FailureKind::Unusable, format!("HTTP {}", reply.status))
                    }
                    Ok(reply) => match classify(reply) {
                        Classified::Usable(value) => {
                            tracing::debug!(%op, endpoint = index, attempt, "relay ok");
                            return Ok(value);
                        }
                        Classified::Unusable(reason) => (FailureKind::Unusable, reason),
                        Classified::Failed(err) => {
                            tracing::debug!(%op, endpoint = index, error = %err, "upstream error");
                            return Err(err);
                        }
                    },
                };
                tracing::warn!(%op, endpoint = index, attempt, error = %message, "relay attempt failed");
                if kind == FailureKind::Transport && attempt < max_attempts {
                    continue;
                }
                break EndpointFailure {
                    url: endpoint.url.clone(),
                    kind,
                    message,
                };
            };
            failures.push(failure);
        }

        Err(QqMusicError::AllEndpointsFailed {
            operation: op,
            failures,
        })
    }

    /// [`call`](Self::call) with the JSON classifier: JSONP wrappers are
    /// stripped, a non-zero top-level `code` is an immediate
    /// [`QqMusicError::Upstream`], and the payload is decoded into `T`
    /// (unknown fields ignored, missing required fields → next endpoint).
    pub fn call_json<T: DeserializeOwned>(
        &self,
        op: Operation,
        params: &Params,
        cookie: Option<&str>,
    ) -> Result<T> {
        self.call(op, params, cookie, |reply| classify_json(&reply))
    }

    fn send(
        &self,
        endpoint: &Endpoint,
        params: &Params,
        cookie: Option<&str>,
    ) -> reqwest::Result<Reply> {
        let url = endpoint.render_url(&params.path);
        let mut req = self
            .http
            .request(endpoint.method.clone(), &url)
            .timeout(self.config.timeout);
        if !params.query.is_empty() {
            req = req.query(&params.query);
        }
        for (name, value) in &endpoint.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
            req = req.header(COOKIE, cookie);
        }
        if let Some(body) = &params.json {
            req = req.json(body);
        }

        let resp = req.send()?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes()?.to_vec();
        Ok(Reply {
            status,
            headers,
            body,
        })
    }
}

fn classify_json<T: DeserializeOwned>(reply: &Reply) -> Classified<T> {
    let text = reply.text();
    let value: Value = match serde_json::from_str(strip_jsonp(&text)) {
        Ok(v) => v,
        Err(e) => return Classified::Unusable(format!("invalid JSON: {e}")),
    };
    if let Some(code) = value.get("code").and_then(Value::as_i64) {
        if code != 0 {
            let message = value
                .get("message")
                .or_else(|| value.get("msg"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_owned();
            return Classified::Failed(QqMusicError::Upstream { code, message });
        }
    }
    match serde_json::from_value(value) {
        Ok(v) => Classified::Usable(v),
        Err(e) => Classified::Unusable(format!("unexpected payload: {e}")),
    }
}

/// Unwrap `callback({...})` into `{...}`; plain JSON passes through.
pub(crate) fn strip_jsonp(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }
    match (trimmed.find('('), trimmed.rfind(')')) {
        (Some(start), Some(end)) if start < end => trimmed[start + 1..end].trim(),
        _ => trimmed,
    }
}

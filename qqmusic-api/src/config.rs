//! Bridge configuration.
//!
//! Three sources, applied in order:
//!
//! 1. Built-in defaults ([`BridgeConfig::default`]).
//! 2. Environment overrides ([`BridgeConfig::from_env`]):
//!    - `QQMUSIC_BRIDGE_TIMEOUT_MS`: per-attempt timeout
//!    - `QQMUSIC_BRIDGE_RETRIES`: transport retries per endpoint
//!    - `QQMUSIC_BRIDGE_SESSION_TTL_SECS`: lifetime of a confirmed session
//!    - `QQMUSIC_BRIDGE_ENDPOINTS_<OPERATION>`: comma-separated URL templates,
//!      e.g. `QQMUSIC_BRIDGE_ENDPOINTS_MUSICU`
//! 3. A JSON document ([`ConfigOverrides`]) handed in by the host.
//!
//! ```json
//! {
//!   "timeoutMs": 3000,
//!   "retriesPerEndpoint": 1,
//!   "sessionTtlSecs": 86400,
//!   "endpoints": { "musicu": ["http://127.0.0.1:8080/cgi-bin/musicu.fcg"] }
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::endpoint::{EndpointTable, Operation};
use crate::error::{QqMusicError, Result};

const ENV_PREFIX: &str = "QQMUSIC_BRIDGE_";

/// Relay behaviour: per-attempt timeout, retry budget and endpoints.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Budget for one attempt against one endpoint.
    pub timeout: Duration,
    /// Extra attempts per endpoint after a transport failure.
    pub retries_per_endpoint: u32,
    pub endpoints: EndpointTable,
    /// Base URL of the audio stream CDN used by mirror-resolved song URLs.
    pub stream_base: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retries_per_endpoint: 1,
            endpoints: EndpointTable::defaults(),
            stream_base: "https://dl.stream.qqmusic.qq.com/".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    pub relay: RelayConfig,
    /// Lifetime given to a freshly confirmed session. `None` means the
    /// session only ends on logout or a new login.
    pub session_ttl: Option<Duration>,
}

/// Host-supplied overrides, deserialized from camelCase JSON.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigOverrides {
    pub timeout_ms: Option<u64>,
    pub retries_per_endpoint: Option<u32>,
    pub session_ttl_secs: Option<u64>,
    pub stream_base: Option<String>,
    pub endpoints: BTreeMap<String, Vec<String>>,
}

impl BridgeConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides read through `lookup` (environment-shaped keys).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut overrides = ConfigOverrides {
            timeout_ms: parse_var(&lookup, "TIMEOUT_MS")?,
            retries_per_endpoint: parse_var(&lookup, "RETRIES")?,
            session_ttl_secs: parse_var(&lookup, "SESSION_TTL_SECS")?,
            stream_base: lookup(&format!("{ENV_PREFIX}STREAM_BASE")),
            endpoints: BTreeMap::new(),
        };
        for op in Operation::ALL {
            let key = format!("{ENV_PREFIX}ENDPOINTS_{}", op.name().to_ascii_uppercase());
            if let Some(raw) = lookup(&key) {
                let urls: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                overrides.endpoints.insert(op.name().to_owned(), urls);
            }
        }
        let mut config = Self::default();
        config.apply(overrides)?;
        Ok(config)
    }

    /// Parse a JSON override document on top of the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let overrides: ConfigOverrides = serde_json::from_str(json)
            .map_err(|e| QqMusicError::InvalidArgument(format!("config: {e}")))?;
        let mut config = Self::default();
        config.apply(overrides)?;
        Ok(config)
    }

    /// Apply `overrides` in place. Endpoint overrides keep default headers.
    pub fn apply(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(ms) = overrides.timeout_ms {
            if ms == 0 {
                return Err(QqMusicError::InvalidArgument("timeout must be > 0".into()));
            }
            self.relay.timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = overrides.retries_per_endpoint {
            self.relay.retries_per_endpoint = retries;
        }
        if let Some(secs) = overrides.session_ttl_secs {
            self.session_ttl = Some(Duration::from_secs(secs));
        }
        if let Some(base) = overrides.stream_base {
            self.relay.stream_base = base;
        }
        for (name, urls) in overrides.endpoints {
            let op = Operation::from_name(&name).ok_or_else(|| {
                QqMusicError::InvalidArgument(format!("unknown operation: {name}"))
            })?;
            if urls.is_empty() {
                return Err(QqMusicError::InvalidArgument(format!(
                    "empty endpoint list for {op}"
                )));
            }
            self.relay.endpoints.set_urls(op, urls);
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    suffix: &str,
) -> Result<Option<T>> {
    let key = format!("{ENV_PREFIX}{suffix}");
    match lookup(&key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| QqMusicError::InvalidArgument(format!("{key}: invalid value {raw:?}"))),
    }
}

//! Upstream operations and their ordered endpoint lists.
//!
//! | Operation         | Method | Primary endpoint                                            |
//! |-------------------|--------|-------------------------------------------------------------|
//! | `QrShow`          | GET    | `ssl.ptlogin2.qq.com/ptqrshow`                              |
//! | `QrPoll`          | GET    | `ssl.ptlogin2.qq.com/ptqrlogin`                             |
//! | `Musicu`          | POST   | `u.y.qq.com/cgi-bin/musicu.fcg` (mirror `u6.y.qq.com`)      |
//! | `Playlist`        | GET    | `c.y.qq.com/qzone/fcg-bin/fcg_ucc_getcdinfo_byids_cp.fcg`   |
//! | `Lyric`           | GET    | `c.y.qq.com/lyric/fcg-bin/fcg_query_lyric_new.fcg`          |
//! | `SongUrlMirror`   | GET    | `c.y.qq.com/base/fcg-bin/fcg_music_express_mobile3.fcg`     |
//! | `Profile`         | GET    | `c.y.qq.com/rsc/fcgi-bin/fcg_get_profile_homepage.fcg`      |
//!
//! URLs are templates: `{name}` placeholders are filled from the request's
//! path parameters before query parameters are appended.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::Method;

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// A logical upstream operation. Each maps to an ordered list of endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    QrShow,
    QrPoll,
    Musicu,
    Playlist,
    Lyric,
    SongUrlMirror,
    Profile,
}

impl Operation {
    pub const ALL: [Self; 7] = [
        Self::QrShow,
        Self::QrPoll,
        Self::Musicu,
        Self::Playlist,
        Self::Lyric,
        Self::SongUrlMirror,
        Self::Profile,
    ];

    /// Stable name used in configuration keys and log fields.
    pub fn name(self) -> &'static str {
        match self {
            Self::QrShow => "qr_show",
            Self::QrPoll => "qr_poll",
            Self::Musicu => "musicu",
            Self::Playlist => "playlist",
            Self::Lyric => "lyric",
            Self::SongUrlMirror => "song_url_mirror",
            Self::Profile => "profile",
        }
    }

    /// Parse a configuration key. Accepts `snake_case` and `camelCase`.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|op| op.name().replace('_', "") == normalized)
    }

    fn method(self) -> Method {
        match self {
            Self::Musicu => Method::POST,
            _ => Method::GET,
        }
    }

    fn default_referer(self) -> &'static str {
        match self {
            Self::QrShow | Self::QrPoll => "https://xui.ptlogin2.qq.com/",
            Self::Musicu | Self::SongUrlMirror => "https://y.qq.com/",
            Self::Playlist => "https://y.qq.com/n/ryqq/playlist",
            Self::Lyric => "https://y.qq.com/portal/player.html",
            Self::Profile => "https://y.qq.com/portal/profile.html",
        }
    }

    fn default_urls(self) -> &'static [&'static str] {
        match self {
            Self::QrShow => &["https://ssl.ptlogin2.qq.com/ptqrshow"],
            Self::QrPoll => &["https://ssl.ptlogin2.qq.com/ptqrlogin"],
            Self::Musicu => &[
                "https://u.y.qq.com/cgi-bin/musicu.fcg",
                "https://u6.y.qq.com/cgi-bin/musicu.fcg",
            ],
            Self::Playlist => &[
                "https://c.y.qq.com/qzone/fcg-bin/fcg_ucc_getcdinfo_byids_cp.fcg",
                "https://c6.y.qq.com/qzone/fcg-bin/fcg_ucc_getcdinfo_byids_cp.fcg",
            ],
            Self::Lyric => &[
                "https://c.y.qq.com/lyric/fcg-bin/fcg_query_lyric_new.fcg",
                "https://c6.y.qq.com/lyric/fcg-bin/fcg_query_lyric_new.fcg",
            ],
            Self::SongUrlMirror => {
                &["https://c.y.qq.com/base/fcg-bin/fcg_music_express_mobile3.fcg"]
            }
            Self::Profile => &["https://c.y.qq.com/rsc/fcgi-bin/fcg_get_profile_homepage.fcg"],
        }
    }

    /// Default endpoint list for this operation.
    pub fn default_endpoints(self) -> Vec<Endpoint> {
        self.endpoints_for(self.default_urls().iter().copied())
    }

    /// Build endpoints for `urls`, carrying this operation's fixed headers.
    pub fn endpoints_for<I, S>(self, urls: I) -> Vec<Endpoint>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .map(|url| Endpoint {
                method: self.method(),
                url: url.into(),
                headers: vec![
                    ("User-Agent".to_owned(), USER_AGENT.to_owned()),
                    ("Referer".to_owned(), self.default_referer().to_owned()),
                ],
            })
            .collect()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One upstream endpoint: method, URL template and fixed headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl Endpoint {
    /// Substitute `{name}` placeholders in the URL template.
    pub fn render_url(&self, path: &[(&str, String)]) -> String {
        let mut url = self.url.clone();
        for (name, value) in path {
            url = url.replace(&format!("{{{name}}}"), &urlencoding::encode(value));
        }
        url
    }
}

/// Ordered endpoint lists keyed by operation.
#[derive(Debug, Clone)]
pub struct EndpointTable {
    entries: BTreeMap<Operation, Vec<Endpoint>>,
}

impl EndpointTable {
    /// Endpoints of the public upstream service.
    pub fn defaults() -> Self {
        let entries = Operation::ALL
            .into_iter()
            .map(|op| (op, op.default_endpoints()))
            .collect();
        Self { entries }
    }

    /// Endpoints for `op`, in fallback order.
    pub fn get(&self, op: Operation) -> &[Endpoint] {
        self.entries.get(&op).map_or(&[], Vec::as_slice)
    }

    /// Replace the endpoint list of `op`.
    pub fn set(&mut self, op: Operation, endpoints: Vec<Endpoint>) {
        self.entries.insert(op, endpoints);
    }

    /// Replace the URL list of `op`, keeping its default headers.
    pub fn set_urls<I, S>(&mut self, op: Operation, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(op, op.endpoints_for(urls));
    }
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self::defaults()
    }
}

//! Song URL and lyric APIs.
//!
//! # Endpoints
//!
//! ## `song_url`, primary: musicu `music.vkey.GetVkey` / `UrlGetVkey`
//!
//! Param: `{ "guid": "...", "songmid": ["<mid>"], "filename": ["M800<mid><mid>.mp3"],
//! "songtype": [0], "uin": "0", "loginflag": 1, "platform": "20" }`
//!
//! Data:
//! ```json
//! {
//!   "midurlinfo": [{ "songmid": "...", "purl": "M800...mp3?guid=...&vkey=..." }],
//!   "sip": ["https://ws.stream.qqmusic.qq.com/", "http://isure.stream.qqmusic.qq.com/"]
//! }
//! ```
//!
//! `purl` is empty when the song requires VIP/purchase or is region-locked.
//!
//! ## `song_url`, fallback: `GET /base/fcg-bin/fcg_music_express_mobile3.fcg`
//!
//! Query: `format=json&cid=205361747&songmid=<mid>&filename=<file>&guid=<guid>`
//!
//! Response: `{ "code": 0, "data": { "items": [{ "filename": "...", "vkey": "..." }] } }`.
//! The playable URL is `<stream base><filename>?vkey=<vkey>&guid=<guid>&uin=0&fromtag=66`.
//!
//! ## `lyric`: `GET /lyric/fcg-bin/fcg_query_lyric_new.fcg`
//!
//! Query: `songmid=<mid>&format=json&nobase64=1&g_tk=<g_tk>`
//!
//! Response: `{ "retcode": 0, "code": 0, "lyric": "[00:00.00]...", "trans": "..." }`.
//! Code `1000` means the lyric needs a login.

use serde_json::json;

use crate::client::{QqMusicClient, normalize_uin};
use crate::endpoint::Operation;
use crate::error::{QqMusicError, Result};
use crate::relay::Params;
use crate::sign::{cookie_value, g_tk, guid};
use crate::types::{Lyric, Quality, SongUrl, UrlSource};
use crate::wire::{ExpressResp, LyricResp, VkeyData};

const EXPRESS_CID: &str = "205361747";
const LOGIN_REQUIRED: i64 = 1000;

impl QqMusicClient {
    /// Resolve a temporary playable URL for song `mid`.
    ///
    /// Tries the vkey service first; when it fails or answers with an empty
    /// URL, the mirror is asked for the same file name.
    ///
    /// # Errors
    ///
    /// [`QqMusicError::Upstream`] with code `-1` when neither source has a
    /// playable URL (no copyright, VIP only). Otherwise the mirror's error.
    pub fn song_url(&self, mid: &str, quality: Quality, cookie: Option<&str>) -> Result<SongUrl> {
        let mid = song_mid(mid)?;
        let cookie = self.effective_cookie(cookie);
        let cookie = cookie.as_deref();
        let filename = quality.filename(mid);
        let guid = guid();

        match self.vkey_url(mid, &filename, &guid, cookie) {
            Ok(Some(url)) => {
                return Ok(SongUrl {
                    url,
                    quality,
                    source: UrlSource::Primary,
                });
            }
            Ok(None) => tracing::debug!(mid, "vkey service returned no URL, trying mirror"),
            Err(e) => tracing::warn!(mid, error = %e, "vkey service failed, trying mirror"),
        }

        let url = self
            .express_url(mid, &filename, &guid, cookie)?
            .ok_or_else(|| QqMusicError::Upstream {
                code: -1,
                message: format!("no playable URL for {mid} (no copyright or VIP required)"),
            })?;
        Ok(SongUrl {
            url,
            quality,
            source: UrlSource::Mirror,
        })
    }

    /// Lyrics for song `mid`, with the translation when one exists.
    ///
    /// # Errors
    ///
    /// - [`QqMusicError::AuthRequired`]: the lyric needs a login and no
    ///   credential was sent
    /// - [`QqMusicError::SessionExpired`]: a credential was sent (or the
    ///   stored one lapsed) and was rejected
    /// - [`QqMusicError::Parse`]: the upstream answered without lyric text
    pub fn lyric(&self, mid: &str, cookie: Option<&str>) -> Result<Lyric> {
        let mid = song_mid(mid)?;
        let cookie = self.effective_cookie(cookie);
        let cookie = cookie.as_deref();
        let params = Params::new()
            .query("songmid", mid)
            .query("format", "json")
            .query("nobase64", 1)
            .query("g_tk", g_tk(cookie));

        let resp: LyricResp = match self.relay.call_json(Operation::Lyric, &params, cookie) {
            Ok(resp) => resp,
            Err(QqMusicError::Upstream {
                code: LOGIN_REQUIRED,
                ..
            }) => return Err(self.restricted(cookie)),
            Err(e) => return Err(e),
        };

        let text = unescape_entities(&resp.lyric);
        if text.trim().is_empty() {
            return Err(QqMusicError::Parse(format!("empty lyric for {mid}")));
        }
        let translation = Some(unescape_entities(&resp.trans)).filter(|t| !t.trim().is_empty());
        Ok(Lyric { text, translation })
    }

    fn vkey_url(
        &self,
        mid: &str,
        filename: &str,
        guid: &str,
        cookie: Option<&str>,
    ) -> Result<Option<String>> {
        let uin = cookie
            .and_then(|c| cookie_value(c, "uin"))
            .map_or_else(|| "0".to_owned(), normalize_uin);
        let param = json!({
            "guid": guid,
            "songmid": [mid],
            "songtype": [0],
            "filename": [filename],
            "uin": uin,
            "loginflag": 1,
            "platform": "20",
        });
        let data: VkeyData = self.musicu("music.vkey.GetVkey", "UrlGetVkey", param, cookie)?;
        let Some(purl) = data
            .midurlinfo
            .into_iter()
            .map(|i| i.purl)
            .find(|p| !p.is_empty())
        else {
            return Ok(None);
        };
        let base = data
            .sip
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| self.relay.config().stream_base.clone());
        Ok(Some(join_url(&base, &purl)))
    }

    fn express_url(
        &self,
        mid: &str,
        filename: &str,
        guid: &str,
        cookie: Option<&str>,
    ) -> Result<Option<String>> {
        let params = Params::new()
            .query("format", "json")
            .query("cid", EXPRESS_CID)
            .query("songmid", mid)
            .query("filename", filename)
            .query("guid", guid);
        let resp: ExpressResp = self.relay.call_json(Operation::SongUrlMirror, &params, cookie)?;
        let Some(item) = resp.data.items.into_iter().find(|i| !i.vkey.is_empty()) else {
            return Ok(None);
        };
        let file = item
            .filename
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| filename.to_owned());
        let base = &self.relay.config().stream_base;
        Ok(Some(format!(
            "{}?vkey={}&guid={}&uin=0&fromtag=66",
            join_url(base, &file),
            urlencoding::encode(&item.vkey),
            urlencoding::encode(guid),
        )))
    }
}

fn song_mid(raw: &str) -> Result<&str> {
    let mid = raw.trim();
    if mid.is_empty() || !mid.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(QqMusicError::InvalidArgument(format!("invalid song mid: {raw:?}")));
    }
    Ok(mid)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Decode the HTML entities the lyric service leaves in `nobase64` output
/// (`&#58;`, `&#x3A;`, `&amp;` ...). Unknown entities are kept verbatim.
fn unescape_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => {
                    let code = if let Some(hex) = entity.strip_prefix("#x") {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        entity.strip_prefix('#').and_then(|d| d.parse().ok())
                    };
                    code.and_then(char::from_u32)
                }
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

//! Playlist API.
//!
//! Endpoint: `GET /qzone/fcg-bin/fcg_ucc_getcdinfo_byids_cp.fcg`
//!
//! Query: `disstid=<id>&type=1&json=1&utf8=1&onlysong=0&new_format=1&format=json`
//!
//! Response (`onlysong=0`):
//! ```json
//! {
//!   "code": 0,
//!   "cdlist": [{
//!     "disstid": "7256912512",
//!     "dissname": "歌单名",
//!     "logo": "https://qpic.y.qq.com/...",
//!     "desc": "描述...",
//!     "songnum": 50,
//!     "nickname": "用户名",
//!     "uin": "100"
//!   }]
//! }
//! ```
//!
//! With `onlysong=1&song_begin=0&song_num=N` the same endpoint answers
//! `{ "code": 0, "songlist": [ { "id": 1, "mid": "...", "name": "...", ... } ],
//! "total_song_num": 50 }`.

use crate::client::QqMusicClient;
use crate::endpoint::Operation;
use crate::error::{QqMusicError, Result};
use crate::relay::Params;
use crate::sign::g_tk;
use crate::types::{Owner, Playlist, Song};
use crate::wire::{CdInfoResp, SongListResp, WireSong, decode_each};

/// Upper bound on tracks requested per track-list page.
const MAX_TRACKS: u64 = 1000;

impl QqMusicClient {
    /// Fetch playlist metadata (no tracks).
    ///
    /// `cookie` overrides the stored session's cookie for this call.
    pub fn playlist(&self, id: &str, cookie: Option<&str>) -> Result<Playlist> {
        let id = playlist_id(id)?;
        let cookie = self.effective_cookie(cookie);
        self.playlist_summary(id, cookie.as_deref())
    }

    /// Fetch playlist metadata and its tracks.
    ///
    /// Malformed track records are skipped and counted in
    /// [`Playlist::skipped_tracks`]; the call still succeeds.
    pub fn playlist_detail(&self, id: &str, cookie: Option<&str>) -> Result<Playlist> {
        let id = playlist_id(id)?;
        let cookie = self.effective_cookie(cookie);
        let mut playlist = self.playlist_summary(id, cookie.as_deref())?;

        let mut tracks = Vec::new();
        let mut skipped = 0;
        let mut total = playlist.track_count;
        let mut begin = 0;
        loop {
            let song_num = total.saturating_sub(begin).clamp(1, MAX_TRACKS);
            let params = base_params(id, cookie.as_deref(), 1)
                .query("song_begin", begin)
                .query("song_num", song_num);
            let resp: SongListResp =
                self.relay
                    .call_json(Operation::Playlist, &params, cookie.as_deref())?;
            if let Some(reported) = resp.total_song_num {
                total = total.max(reported);
            }
            let received = resp.songlist.len() as u64;
            let (page, page_skipped) = decode_each::<WireSong, Song>(resp.songlist);
            tracks.extend(page);
            skipped += page_skipped;
            begin += received;
            if received == 0 || begin >= total {
                break;
            }
        }

        if skipped > 0 {
            tracing::warn!(playlist = id, skipped, "skipped malformed track records");
        }
        if begin < total {
            tracing::warn!(playlist = id, received = begin, total, "track list ended early");
        }
        playlist.track_count = total;
        playlist.tracks = Some(tracks);
        playlist.skipped_tracks = skipped;
        Ok(playlist)
    }

    fn playlist_summary(&self, id: &str, cookie: Option<&str>) -> Result<Playlist> {
        let params = base_params(id, cookie, 0);
        let resp: CdInfoResp = self.relay.call_json(Operation::Playlist, &params, cookie)?;
        let info = resp
            .cdlist
            .into_iter()
            .next()
            .ok_or_else(|| QqMusicError::Parse(format!("playlist not found: {id}")))?;

        let owner = info
            .nickname
            .filter(|n| !n.is_empty())
            .map(|name| Owner {
                uin: info.uin,
                name,
            });
        Ok(Playlist {
            id: info.disstid,
            title: info.dissname,
            cover_url: info.logo.filter(|l| !l.is_empty()),
            description: info.desc.filter(|d| !d.is_empty()),
            track_count: info.songnum,
            owner,
            tracks: None,
            skipped_tracks: 0,
        })
    }
}

fn playlist_id(raw: &str) -> Result<&str> {
    let id = raw.trim();
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(QqMusicError::InvalidArgument(format!("invalid playlist id: {raw:?}")));
    }
    Ok(id)
}

fn base_params(id: &str, cookie: Option<&str>, onlysong: u8) -> Params {
    Params::new()
        .query("type", 1)
        .query("json", 1)
        .query("utf8", 1)
        .query("onlysong", onlysong)
        .query("new_format", 1)
        .query("disstid", id)
        .query("format", "json")
        .query("g_tk", g_tk(cookie))
}

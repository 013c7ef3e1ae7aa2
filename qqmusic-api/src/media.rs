//! Album and MV detail APIs (musicu).
//!
//! | Method                      | Module / method                                         |
//! |-----------------------------|---------------------------------------------------------|
//! | [`QqMusicClient::album_info`] | `music.musichallAlbum.AlbumInfoServer` / `GetAlbumDetail` |
//! | [`QqMusicClient::mv_info`]    | `video.VideoDataServer` / `get_video_info_batch`        |
//!
//! `GetAlbumDetail` answers `{ "basicInfo": {...}, "singer": { "singerList": [...] } }`.
//! `get_video_info_batch` answers a map keyed by vid: `{ "<vid>": { "vid": ..., "name": ... } }`.

use std::collections::BTreeMap;

use serde_json::json;

use crate::client::QqMusicClient;
use crate::error::{QqMusicError, Result};
use crate::types::{Album, Mv};
use crate::wire::{AlbumDetail, WireMv};

const MV_FIELDS: [&str; 6] = ["vid", "name", "desc", "cover_pic", "duration", "singers"];

impl QqMusicClient {
    /// Album metadata by album mid.
    pub fn album_info(&self, album_mid: &str) -> Result<Album> {
        let mid = non_empty(album_mid, "album mid")?;
        let cookie = self.effective_cookie(None);
        let detail: AlbumDetail = self.musicu(
            "music.musichallAlbum.AlbumInfoServer",
            "GetAlbumDetail",
            json!({ "albumMid": mid }),
            cookie.as_deref(),
        )?;
        Ok(detail.into())
    }

    /// MV metadata by vid.
    pub fn mv_info(&self, vid: &str) -> Result<Mv> {
        let vid = non_empty(vid, "mv id")?;
        let cookie = self.effective_cookie(None);
        let mut data: BTreeMap<String, WireMv> = self.musicu(
            "video.VideoDataServer",
            "get_video_info_batch",
            json!({ "vidlist": [vid], "required": MV_FIELDS }),
            cookie.as_deref(),
        )?;
        data.remove(vid)
            .map(Mv::from)
            .ok_or_else(|| QqMusicError::Parse(format!("mv not found: {vid}")))
    }
}

fn non_empty<'a>(raw: &'a str, what: &str) -> Result<&'a str> {
    let v = raw.trim();
    if v.is_empty() {
        return Err(QqMusicError::InvalidArgument(format!("empty {what}")));
    }
    Ok(v)
}

//! Partial schemas of upstream payloads.
//!
//! Only the fields the resolvers read are declared. Unknown fields are
//! ignored; a missing required field fails decoding, which the relay treats
//! as an unusable payload (or, for list items, the item is skipped).

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::cover::album_cover;
use crate::types::{Album, Mv, Singer, Song};

// ── musicu envelope ──

/// `{ "code": 0, "req": { "code": 0, "data": {...} } }`
#[derive(Debug, Deserialize)]
pub(crate) struct MusicuResp<T> {
    pub req: MusicuReq<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MusicuReq<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    pub data: Option<T>,
}

// ── playlist (fcg_ucc_getcdinfo_byids_cp) ──

#[derive(Debug, Deserialize)]
pub(crate) struct CdInfoResp {
    #[serde(default)]
    pub cdlist: Vec<CdInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CdInfo {
    #[serde(deserialize_with = "string_or_number")]
    pub disstid: String,
    pub dissname: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub songnum: u64,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub uin: Option<String>,
}

/// Track-list stage (`onlysong=1`). Items stay raw so each one can be
/// decoded on its own.
#[derive(Debug, Deserialize)]
pub(crate) struct SongListResp {
    #[serde(default)]
    pub songlist: Vec<Value>,
    #[serde(default)]
    pub total_song_num: Option<u64>,
}

// ── songs / singers / albums ──

#[derive(Debug, Deserialize)]
pub(crate) struct WireSong {
    #[serde(default)]
    pub id: Option<u64>,
    pub mid: String,
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default)]
    pub interval: u64,
    #[serde(default)]
    pub singer: Vec<WireSinger>,
    #[serde(default)]
    pub album: Option<WireAlbumBrief>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSinger {
    #[serde(default, alias = "singerMID", alias = "singer_mid")]
    pub mid: String,
    #[serde(alias = "singerName", alias = "singer_name")]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireAlbumBrief {
    #[serde(default)]
    pub mid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pmid: String,
}

impl From<WireSinger> for Singer {
    fn from(s: WireSinger) -> Self {
        Self {
            mid: s.mid,
            name: s.name,
        }
    }
}

impl From<WireSong> for Song {
    fn from(s: WireSong) -> Self {
        let album = s.album.filter(|a| !a.mid.is_empty() || !a.name.is_empty()).map(|a| {
            let cover_key = if a.pmid.is_empty() { &a.mid } else { &a.pmid };
            Album {
                cover_url: album_cover(cover_key),
                mid: a.mid,
                name: a.name,
                singers: Vec::new(),
                publish_date: None,
                description: None,
            }
        });
        Self {
            id: s.id,
            mid: s.mid,
            name: s.name,
            singers: s.singer.into_iter().map(Singer::from).collect(),
            album,
            duration_secs: s.interval,
        }
    }
}

// ── search (DoSearchForQQMusicDesktop) ──

#[derive(Debug, Deserialize)]
pub(crate) struct SearchData {
    #[serde(default)]
    pub body: BTreeMap<String, SearchBucket>,
    #[serde(default)]
    pub meta: SearchMeta,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchBucket {
    #[serde(default)]
    pub list: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchMeta {
    #[serde(default)]
    pub sum: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSearchAlbum {
    #[serde(rename = "albumMID")]
    pub mid: String,
    #[serde(rename = "albumName")]
    pub name: String,
    #[serde(default, rename = "albumPic")]
    pub pic: Option<String>,
    #[serde(default, rename = "publicTime")]
    pub public_time: Option<String>,
    #[serde(default)]
    pub singer_list: Vec<WireSinger>,
}

impl From<WireSearchAlbum> for Album {
    fn from(a: WireSearchAlbum) -> Self {
        Self {
            cover_url: a.pic.filter(|p| !p.is_empty()).or_else(|| album_cover(&a.mid)),
            mid: a.mid,
            name: a.name,
            singers: a.singer_list.into_iter().map(Singer::from).collect(),
            publish_date: a.public_time.filter(|t| !t.is_empty()),
            description: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSearchSinger {
    #[serde(rename = "singerMID")]
    pub mid: String,
    #[serde(rename = "singerName")]
    pub name: String,
}

impl From<WireSearchSinger> for Singer {
    fn from(s: WireSearchSinger) -> Self {
        Self {
            mid: s.mid,
            name: s.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSearchMv {
    #[serde(alias = "vid")]
    pub v_id: String,
    #[serde(alias = "mv_name")]
    pub name: String,
    #[serde(default, alias = "mv_pic_url")]
    pub pic: Option<String>,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub singer_list: Vec<WireSinger>,
}

impl From<WireSearchMv> for Mv {
    fn from(m: WireSearchMv) -> Self {
        Self {
            vid: m.v_id,
            name: m.name,
            singers: m.singer_list.into_iter().map(Singer::from).collect(),
            cover_url: m.pic.filter(|p| !p.is_empty()),
            description: None,
            duration_secs: m.duration,
        }
    }
}

// ── album detail (music.musichallAlbum.AlbumInfoServer) ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AlbumDetail {
    pub basic_info: AlbumBasicInfo,
    #[serde(default)]
    pub singer: AlbumSingers,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AlbumBasicInfo {
    pub album_mid: String,
    pub album_name: String,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub pmid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AlbumSingers {
    #[serde(default)]
    pub singer_list: Vec<WireSinger>,
}

impl From<AlbumDetail> for Album {
    fn from(d: AlbumDetail) -> Self {
        let info = d.basic_info;
        let cover_key = info.pmid.as_deref().filter(|p| !p.is_empty()).unwrap_or(&info.album_mid);
        Self {
            cover_url: album_cover(cover_key),
            mid: info.album_mid,
            name: info.album_name,
            singers: d.singer.singer_list.into_iter().map(Singer::from).collect(),
            publish_date: info.publish_date.filter(|s| !s.is_empty()),
            description: info.desc.filter(|s| !s.is_empty()),
        }
    }
}

// ── MV info (video.VideoDataServer) ──

#[derive(Debug, Deserialize)]
pub(crate) struct WireMv {
    pub vid: String,
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub cover_pic: Option<String>,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub singers: Vec<WireSinger>,
}

impl From<WireMv> for Mv {
    fn from(m: WireMv) -> Self {
        Self {
            vid: m.vid,
            name: m.name,
            singers: m.singers.into_iter().map(Singer::from).collect(),
            cover_url: m.cover_pic.filter(|s| !s.is_empty()),
            description: m.desc.filter(|s| !s.is_empty()),
            duration_secs: m.duration,
        }
    }
}

// ── song URL ──

/// `music.vkey.GetVkey` / `UrlGetVkey` data.
#[derive(Debug, Deserialize)]
pub(crate) struct VkeyData {
    #[serde(default)]
    pub midurlinfo: Vec<MidUrlInfo>,
    #[serde(default)]
    pub sip: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MidUrlInfo {
    #[serde(default)]
    pub purl: String,
}

/// `fcg_music_express_mobile3` response.
#[derive(Debug, Deserialize)]
pub(crate) struct ExpressResp {
    pub data: ExpressData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExpressData {
    #[serde(default)]
    pub items: Vec<ExpressItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExpressItem {
    #[serde(default)]
    pub vkey: String,
    #[serde(default)]
    pub filename: Option<String>,
}

// ── lyric / profile ──

#[derive(Debug, Deserialize)]
pub(crate) struct LyricResp {
    #[serde(default)]
    pub lyric: String,
    #[serde(default)]
    pub trans: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileResp {
    pub data: ProfileData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileData {
    pub creator: ProfileCreator,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileCreator {
    pub nick: String,
    #[serde(default)]
    pub headpic: Option<String>,
}

// ── helpers ──

pub(crate) fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

pub(crate) fn opt_string_or_number<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Decode every item of `items` as `W`, converting to `T`; malformed items
/// are dropped. Returns the items and the number dropped.
pub(crate) fn decode_each<W, T>(items: Vec<Value>) -> (Vec<T>, u64)
where
    W: for<'de> Deserialize<'de>,
    T: From<W>,
{
    let mut out = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for item in items {
        match serde_json::from_value::<W>(item) {
            Ok(w) => out.push(T::from(w)),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed record");
                skipped += 1;
            }
        }
    }
    (out, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn song_record_maps_album_cover_from_pmid() {
        let w: WireSong = serde_json::from_value(json!({
            "id": 7, "mid": "m1", "name": "Song", "interval": 200,
            "singer": [{ "mid": "s1", "name": "Singer" }],
            "album": { "mid": "a1", "name": "Album", "pmid": "p1" },
            "extra": true
        }))
        .unwrap();
        let s = Song::from(w);
        assert_eq!(s.id, Some(7));
        assert_eq!(s.singers[0].name, "Singer");
        let album = s.album.unwrap();
        assert_eq!(album.mid, "a1");
        assert!(album.cover_url.unwrap().ends_with("M000p1.jpg"));
    }

    #[test]
    fn missing_required_field_fails() {
        assert!(serde_json::from_value::<WireSong>(json!({ "name": "no mid" })).is_err());
    }

    #[test]
    fn decode_each_counts_skips() {
        let items = vec![
            json!({ "mid": "a", "name": "A" }),
            json!({ "mid": 5 }),
            json!({ "mid": "b", "name": "B" }),
        ];
        let (songs, skipped): (Vec<Song>, u64) = decode_each::<WireSong, Song>(items);
        assert_eq!(songs.len(), 2);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn ids_accept_numbers_or_strings() {
        let c: CdInfo = serde_json::from_value(json!({
            "disstid": 123, "dissname": "x", "uin": ""
        }))
        .unwrap();
        assert_eq!(c.disstid, "123");
        assert_eq!(c.uin, None);
    }

    #[test]
    fn musicu_req_without_data() {
        let r: MusicuResp<VkeyData> =
            serde_json::from_value(json!({ "code": 0, "req": { "code": 2000 } })).unwrap();
        assert_eq!(r.req.code, 2000);
        assert!(r.req.data.is_none());
    }
}

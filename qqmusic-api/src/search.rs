//! Search API.
//!
//! musicu module `music.search.SearchCgiService`, method
//! `DoSearchForQQMusicDesktop`.
//!
//! Param:
//! - `query`: search keyword
//! - `search_type`: 0 = song, 1 = singer, 2 = album, 4 = MV
//! - `page_num`: 1-based page
//! - `num_per_page`: page size (fixed at 20)
//!
//! Data:
//! ```json
//! {
//!   "meta": { "sum": 268 },
//!   "body": {
//!     "song":   { "list": [ { "mid": "...", "name": "...", "singer": [...], "album": {...} } ] },
//!     "singer": { "list": [ { "singerMID": "...", "singerName": "..." } ] },
//!     "album":  { "list": [ { "albumMID": "...", "albumName": "...", "albumPic": "..." } ] },
//!     "mv":     { "list": [ { "v_id": "...", "mv_name": "...", "mv_pic_url": "..." } ] }
//!   }
//! }
//! ```
//!
//! Only the bucket matching `search_type` is populated.

use serde::Deserialize;
use serde_json::json;

use crate::client::QqMusicClient;
use crate::error::{QqMusicError, Result};
use crate::types::{Album, Mv, SearchPage, SearchType, Singer, Song};
use crate::wire::{SearchData, WireSearchAlbum, WireSearchMv, WireSearchSinger, WireSong, decode_each};

/// Results per page.
pub const PAGE_SIZE: u32 = 20;

impl QqMusicClient {
    /// Search songs. `page` is 1-based; `0` is treated as `1`.
    pub fn search_songs(&self, keyword: &str, page: u32) -> Result<SearchPage<Song>> {
        self.search::<WireSong, Song>(keyword, page, SearchType::Song)
    }

    pub fn search_singers(&self, keyword: &str, page: u32) -> Result<SearchPage<Singer>> {
        self.search::<WireSearchSinger, Singer>(keyword, page, SearchType::Singer)
    }

    pub fn search_albums(&self, keyword: &str, page: u32) -> Result<SearchPage<Album>> {
        self.search::<WireSearchAlbum, Album>(keyword, page, SearchType::Album)
    }

    pub fn search_mvs(&self, keyword: &str, page: u32) -> Result<SearchPage<Mv>> {
        self.search::<WireSearchMv, Mv>(keyword, page, SearchType::Mv)
    }

    fn search<W, T>(&self, keyword: &str, page: u32, search_type: SearchType) -> Result<SearchPage<T>>
    where
        W: for<'de> Deserialize<'de>,
        T: From<W>,
    {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(QqMusicError::InvalidArgument("empty search keyword".into()));
        }
        let page = page.max(1);
        let cookie = self.effective_cookie(None);
        let param = json!({
            "query": keyword,
            "search_type": search_type as u8,
            "page_num": page,
            "num_per_page": PAGE_SIZE,
        });
        let mut data: SearchData = self.musicu(
            "music.search.SearchCgiService",
            "DoSearchForQQMusicDesktop",
            param,
            cookie.as_deref(),
        )?;

        let list = data
            .body
            .remove(search_type.body_key())
            .map(|bucket| bucket.list)
            .unwrap_or_default();
        let (items, skipped) = decode_each::<W, T>(list);
        if skipped > 0 {
            tracing::warn!(keyword, ?search_type, skipped, "skipped malformed search results");
        }
        Ok(SearchPage {
            keyword: keyword.to_owned(),
            page,
            page_size: PAGE_SIZE,
            total: data.meta.sum,
            items,
        })
    }
}

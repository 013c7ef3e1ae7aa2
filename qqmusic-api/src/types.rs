//! Entity types handed to hosts.
//!
//! These are read-only projections of upstream payloads. They serialize in
//! camelCase because they end up as JSON on the far side of the boundary.

use serde::Serialize;

use crate::error::{QqMusicError, Result};

/// A singer (artist).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Singer {
    /// Upstream singer mid (e.g. `0025NhlN2yWrP4`).
    pub mid: String,
    pub name: String,
}

/// An album.
///
/// Songs embed a brief album (`mid`, `name`, `cover_url`); the album info
/// endpoint fills the remaining fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub mid: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub singers: Vec<Singer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A song (track).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    /// Numeric song id, when the upstream supplies one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Song mid, used by the URL and lyric resolvers.
    pub mid: String,
    pub name: String,
    pub singers: Vec<Singer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<Album>,
    /// Duration in seconds.
    pub duration_secs: u64,
}

/// A music video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mv {
    pub vid: String,
    pub name: String,
    pub singers: Vec<Singer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub duration_secs: u64,
}

/// Abbreviated user info embedded in [`Playlist`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uin: Option<String>,
    pub name: String,
}

/// A playlist. `tracks` is only populated by the detail resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub track_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<Song>>,
    /// Track records dropped because they were malformed.
    #[serde(skip_serializing_if = "is_zero")]
    pub skipped_tracks: u64,
}

/// Lyrics in LRC format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lyric {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

/// Which resolver stage produced a [`SongUrl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UrlSource {
    Primary,
    Mirror,
}

/// A playable (temporary) audio URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongUrl {
    pub url: String,
    pub quality: Quality,
    pub source: UrlSource,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage<T> {
    pub keyword: String,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub items: Vec<T>,
}

/// Public profile of the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uin: String,
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Audio quality, mapped to the upstream file name prefix and extension.
///
/// | Variant    | Prefix | Ext    | Typical bitrate |
/// |------------|--------|--------|-----------------|
/// | `Aac`      | `C400` | `m4a`  | 96 kbps         |
/// | `Standard` | `M500` | `mp3`  | 128 kbps        |
/// | `High`     | `M800` | `mp3`  | 320 kbps        |
/// | `Lossless` | `F000` | `flac` | lossless (VIP)  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Quality {
    Aac,
    Standard,
    High,
    Lossless,
}

impl Quality {
    /// Parse a host-supplied quality name. Empty input means [`Quality::Aac`].
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "aac" | "m4a" => Ok(Self::Aac),
            "standard" | "128" | "mp3_128" => Ok(Self::Standard),
            "high" | "320" | "mp3_320" => Ok(Self::High),
            "lossless" | "flac" => Ok(Self::Lossless),
            other => Err(QqMusicError::InvalidArgument(format!("unknown quality: {other}"))),
        }
    }

    /// Upstream media file name for song `mid`.
    pub fn filename(self, mid: &str) -> String {
        let (prefix, ext) = match self {
            Self::Aac => ("C400", "m4a"),
            Self::Standard => ("M500", "mp3"),
            Self::High => ("M800", "mp3"),
            Self::Lossless => ("F000", "flac"),
        };
        format!("{prefix}{mid}{mid}.{ext}")
    }
}

/// Search target, mapped to the upstream `search_type` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Song = 0,
    Singer = 1,
    Album = 2,
    Mv = 4,
}

impl SearchType {
    /// Key of the result list under `req.data.body`.
    pub(crate) fn body_key(self) -> &'static str {
        match self {
            Self::Song => "song",
            Self::Singer => "singer",
            Self::Album => "album",
            Self::Mv => "mv",
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(n: &u64) -> bool {
    *n == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_names() {
        assert_eq!(Quality::parse("").unwrap(), Quality::Aac);
        assert_eq!(Quality::parse("HIGH").unwrap(), Quality::High);
        assert_eq!(Quality::parse("flac").unwrap(), Quality::Lossless);
        assert!(Quality::parse("ultra").is_err());
    }

    #[test]
    fn filenames_repeat_mid() {
        assert_eq!(Quality::High.filename("abc"), "M800abcabc.mp3");
        assert_eq!(Quality::Aac.filename("abc"), "C400abcabc.m4a");
    }
}

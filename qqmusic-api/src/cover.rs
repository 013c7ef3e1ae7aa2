//! Cover image URL templating. Pure formatting, no network.

use crate::error::{QqMusicError, Result};

const PHOTO_BASE: &str = "https://y.gtimg.cn/music/photo_new";

/// Build a 300×300 cover URL for `content_id`.
///
/// | `content_type`       | URL                                             |
/// |----------------------|-------------------------------------------------|
/// | `album`              | `photo_new/T002R300x300M000{id}.jpg`            |
/// | `singer` / `artist`  | `photo_new/T001R300x300M000{id}.jpg`            |
/// | `user` / `profile`   | `q1.qlogo.cn/g?b=qq&nk={id}&s=140`              |
/// | three digits, `002`  | `photo_new/T{type}R300x300M000{id}.jpg`         |
pub fn cover_url(content_id: &str, content_type: &str) -> Result<String> {
    let id = content_id.trim();
    if id.is_empty() {
        return Err(QqMusicError::InvalidArgument("empty content id".into()));
    }
    let kind = content_type.trim().to_ascii_lowercase();
    let code = match kind.as_str() {
        "album" => "002",
        "singer" | "artist" => "001",
        "user" | "profile" => {
            return Ok(format!(
                "https://q1.qlogo.cn/g?b=qq&nk={}&s=140",
                urlencoding::encode(id)
            ));
        }
        raw if raw.len() == 3 && raw.bytes().all(|b| b.is_ascii_digit()) => raw,
        other => {
            return Err(QqMusicError::InvalidArgument(format!(
                "unsupported cover type: {other}"
            )));
        }
    };
    Ok(format!(
        "{PHOTO_BASE}/T{code}R300x300M000{}.jpg",
        urlencoding::encode(id)
    ))
}

/// Album cover for an album `pmid`/`mid`, or `None` when it is blank.
pub(crate) fn album_cover(mid: &str) -> Option<String> {
    cover_url(mid, "album").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn album_and_singer_covers() {
        assert_eq!(
            cover_url("004Z8Ihr0JIu5s", "album").unwrap(),
            "https://y.gtimg.cn/music/photo_new/T002R300x300M000004Z8Ihr0JIu5s.jpg"
        );
        assert_eq!(
            cover_url("0025NhlN2yWrP4", "Singer").unwrap(),
            "https://y.gtimg.cn/music/photo_new/T001R300x300M0000025NhlN2yWrP4.jpg"
        );
        assert!(cover_url("x", "002").unwrap().contains("/T002R300x300M000x.jpg"));
    }

    #[test]
    fn user_avatar_and_rejections() {
        assert_eq!(
            cover_url("100", "user").unwrap(),
            "https://q1.qlogo.cn/g?b=qq&nk=100&s=140"
        );
        assert!(cover_url("", "album").is_err());
        assert!(cover_url("x", "poster").is_err());
        assert_eq!(album_cover("  "), None);
    }
}

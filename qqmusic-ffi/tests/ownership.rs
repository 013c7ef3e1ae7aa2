use std::ffi::{CString, c_char};

use httpmock::MockServer;
use qqmusic_ffi::{
    QQMusicConfigure, QQMusicFreeString, QQMusicGenCoverURL, QQMusicGetAlbumInfo,
    QQMusicGetLyric, QQMusicGetMVInfo, QQMusicGetPlaylist, QQMusicGetPlaylistDetail,
    QQMusicGetSongURL, QQMusicGetUserInfo, QQMusicLiveStringCount, QQMusicPollLoginStatus,
    QQMusicSearchAlbum, QQMusicSearchMV, QQMusicSearchSinger, QQMusicSearchSong,
    QQMusicStartLogin,
};
use serde_json::json;

fn release(p: *mut c_char) {
    assert!(!p.is_null());
    unsafe { QQMusicFreeString(p) };
}

// Single test: the live counter is process-wide.
#[test]
fn every_returned_string_is_released_exactly_once() {
    // Every endpoint answers 404, so each call fails fast with an envelope.
    let server = MockServer::start();
    let urls = |path: &str| vec![server.url(path)];
    let doc = json!({
        "timeoutMs": 1000,
        "endpoints": {
            "qr_show": urls("/a"), "qr_poll": urls("/b"), "musicu": urls("/c"),
            "playlist": urls("/d"), "lyric": urls("/e"), "song_url_mirror": urls("/f"),
            "profile": urls("/g")
        }
    });
    let doc = CString::new(doc.to_string()).unwrap();
    let s = |v: &str| CString::new(v).unwrap();
    let (id, mid, kw, cookie) = (s("123"), s("abc"), s("jay"), s("uin=o100; skey=@k"));
    let album = s("album");
    let null = std::ptr::null();

    let baseline = QQMusicLiveStringCount();
    let check = |name: &str, p: *mut c_char| {
        assert_eq!(QQMusicLiveStringCount(), baseline + 1, "{name} did not allocate once");
        release(p);
        assert_eq!(QQMusicLiveStringCount(), baseline, "{name} leaked");
    };

    unsafe {
        check("configure", QQMusicConfigure(doc.as_ptr()));
        check("start", QQMusicStartLogin());
        check("poll", QQMusicPollLoginStatus(id.as_ptr()));
        check("playlist", QQMusicGetPlaylist(id.as_ptr(), null));
        check("detail", QQMusicGetPlaylistDetail(id.as_ptr(), cookie.as_ptr()));
        check("url", QQMusicGetSongURL(mid.as_ptr(), null, null));
        check("lyric", QQMusicGetLyric(mid.as_ptr(), null));
        check("song", QQMusicSearchSong(kw.as_ptr(), 1));
        check("album", QQMusicSearchAlbum(kw.as_ptr(), 1));
        check("mv", QQMusicSearchMV(kw.as_ptr(), 1));
        check("singer", QQMusicSearchSinger(kw.as_ptr(), 1));
        check("album info", QQMusicGetAlbumInfo(mid.as_ptr()));
        check("mv info", QQMusicGetMVInfo(mid.as_ptr()));
        check("user", QQMusicGetUserInfo(cookie.as_ptr()));
        check("null arg", QQMusicGetPlaylist(null, null));
        check("cover", QQMusicGenCoverURL(mid.as_ptr(), album.as_ptr()));
    }

    // Null is a no-op; non-allocating failures return null.
    unsafe { QQMusicFreeString(std::ptr::null_mut()) };
    let bad = s("poster");
    assert!(unsafe { QQMusicGenCoverURL(mid.as_ptr(), bad.as_ptr()) }.is_null());
    assert_eq!(QQMusicLiveStringCount(), baseline);
}

use std::ffi::{CStr, CString, c_char};
use std::sync::{Mutex, MutexGuard, PoisonError};

use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use qqmusic_ffi::{
    QQMusicCancelLogin, QQMusicConfigure, QQMusicFreeString, QQMusicGenCoverURL,
    QQMusicGetLyric, QQMusicGetPlaylist, QQMusicGetSongURL, QQMusicLogout,
    QQMusicPollLoginStatus, QQMusicSearchSong, QQMusicStartLogin,
};
use serde_json::{Value, json};

/// The bridge instance is process-wide.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Copy and release a bridge string.
fn take(p: *mut c_char) -> String {
    assert!(!p.is_null());
    let s = unsafe { CStr::from_ptr(p) }.to_str().unwrap().to_owned();
    unsafe { QQMusicFreeString(p) };
    s
}

fn envelope(p: *mut c_char) -> Value {
    serde_json::from_str(&take(p)).unwrap()
}

fn configure(server: &MockServer) {
    let doc = json!({
        "timeoutMs": 2000,
        "retriesPerEndpoint": 1,
        "streamBase": server.url("/stream/"),
        "endpoints": {
            "qrShow": [server.url("/ptqrshow")],
            "qrPoll": [server.url("/ptqrlogin")],
            "musicu": [server.url("/cgi-bin/musicu.fcg")],
            "playlist": [server.url("/playlist")],
            "lyric": [server.url("/lyric")],
            "songUrlMirror": [server.url("/express")],
            "profile": [server.url("/profile")]
        }
    });
    let c = CString::new(doc.to_string()).unwrap();
    let env = envelope(unsafe { QQMusicConfigure(c.as_ptr()) });
    assert_eq!(env["code"], 0, "{env}");
}

#[test]
fn playlist_envelopes_are_identical_across_calls() {
    let _guard = serial();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/playlist").query_param("disstid", "123");
        then.status(200).json_body(json!({
            "code": 0,
            "cdlist": [{ "disstid": "123", "dissname": "Weekend", "songnum": 3,
                         "nickname": "owner", "uin": "100" }]
        }));
    });
    configure(&server);

    let id = CString::new("123").unwrap();
    let a = take(unsafe { QQMusicGetPlaylist(id.as_ptr(), std::ptr::null()) });
    let b = take(unsafe { QQMusicGetPlaylist(id.as_ptr(), std::ptr::null()) });
    assert_eq!(a, b);
    let env: Value = serde_json::from_str(&a).unwrap();
    assert_eq!(env["code"], 0);
    assert_eq!(env["data"]["title"], "Weekend");
    assert_eq!(env["data"]["trackCount"], 3);
}

#[test]
fn song_url_reports_mirror_source() {
    let _guard = serial();
    let server = MockServer::start();
    let primary = server.mock(|when, then| {
        when.method(POST).path("/cgi-bin/musicu.fcg");
        then.status(503);
    });
    server.mock(|when, then| {
        when.method(GET).path("/express");
        then.status(200)
            .json_body(json!({ "code": 0, "data": { "items": [{ "vkey": "VK" }] } }));
    });
    configure(&server);

    let mid = CString::new("abc").unwrap();
    let quality = CString::new("high").unwrap();
    let env = envelope(unsafe {
        QQMusicGetSongURL(mid.as_ptr(), quality.as_ptr(), std::ptr::null())
    });
    assert_eq!(env["code"], 0, "{env}");
    assert_eq!(env["data"]["source"], "mirror");
    assert_eq!(env["data"]["quality"], "high");
    assert!(
        env["data"]["url"]
            .as_str()
            .unwrap()
            .starts_with(&server.url("/stream/M800abcabc.mp3?vkey=VK"))
    );
    primary.assert_hits(2);

    let bad = CString::new("ultra").unwrap();
    let env = envelope(unsafe { QQMusicGetSongURL(mid.as_ptr(), bad.as_ptr(), std::ptr::null()) });
    assert_eq!(env["code"], 1007);
}

#[test]
fn errors_use_the_taxonomy_codes() {
    let _guard = serial();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/lyric");
        then.status(200).json_body(json!({ "retcode": -1, "code": 1000 }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/cgi-bin/musicu.fcg");
        then.status(200).json_body(json!({ "code": 500001, "msg": "busy" }));
    });
    configure(&server);
    QQMusicLogout();

    let mid = CString::new("abc").unwrap();
    let env = envelope(unsafe { QQMusicGetLyric(mid.as_ptr(), std::ptr::null()) });
    assert_eq!(env["code"], 1006);

    let env = envelope(unsafe { QQMusicGetLyric(std::ptr::null(), std::ptr::null()) });
    assert_eq!(env["code"], 1007);

    let kw = CString::new("jay").unwrap();
    let env = envelope(unsafe { QQMusicSearchSong(kw.as_ptr(), 0) });
    assert_eq!(env["code"], 1002);
    assert_eq!(env["data"]["upstreamCode"], 500_001);

    let bad = CString::new("{not json").unwrap();
    assert_eq!(envelope(unsafe { QQMusicConfigure(bad.as_ptr()) })["code"], 1007);
}

#[test]
fn login_through_the_boundary() {
    let _guard = serial();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/ptqrshow");
        then.status(200)
            .header("content-type", "image/png")
            .header("set-cookie", "qrsig=q1; Path=/")
            .body([1u8, 2, 3]);
    });
    let poll = server.mock(|when, then| {
        when.method(GET).path("/ptqrlogin");
        then.status(200)
            .header("set-cookie", "skey=@k; Path=/")
            .body("ptuiCB('0','0','https://x.qq.com/check_sig?uin=100&ptsigx=s','0','ok', 'n')");
    });
    configure(&server);

    let started = envelope(QQMusicStartLogin());
    assert_eq!(started["code"], 0);
    assert_eq!(started["data"]["state"], "WaitingScan");
    assert_eq!(started["data"]["qrPayload"], "AQID");
    assert_eq!(started["data"]["mime"], "image/png");

    let key = CString::new(started["data"]["key"].as_str().unwrap()).unwrap();
    let confirmed = envelope(unsafe { QQMusicPollLoginStatus(key.as_ptr()) });
    assert_eq!(confirmed["data"]["state"], "Confirmed");
    assert_eq!(confirmed["data"]["uin"], "100");
    assert_eq!(confirmed["data"]["cookie"], "skey=@k");
    let again = envelope(unsafe { QQMusicPollLoginStatus(key.as_ptr()) });
    assert_eq!(again["data"]["state"], "Confirmed");
    poll.assert_hits(1);

    QQMusicCancelLogin();
    let stale = envelope(unsafe { QQMusicPollLoginStatus(key.as_ptr()) });
    assert_eq!(stale["code"], 1005);
    QQMusicLogout();
}

#[test]
fn failed_login_keeps_the_snapshot() {
    let _guard = serial();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/ptqrshow");
        then.status(200).body("no cookie here");
    });
    configure(&server);

    let env = envelope(QQMusicStartLogin());
    assert_eq!(env["code"], 1003);
    assert_eq!(env["data"]["state"], "Failed");
    assert!(env["data"]["key"].is_string());
}

#[test]
fn cover_urls_are_plain_strings() {
    let id = CString::new("004Z8Ihr0JIu5s").unwrap();
    let album = CString::new("album").unwrap();
    let url = take(unsafe { QQMusicGenCoverURL(id.as_ptr(), album.as_ptr()) });
    assert_eq!(
        url,
        "https://y.gtimg.cn/music/photo_new/T002R300x300M000004Z8Ihr0JIu5s.jpg"
    );

    let bogus = CString::new("poster").unwrap();
    assert!(unsafe { QQMusicGenCoverURL(id.as_ptr(), bogus.as_ptr()) }.is_null());
    assert!(unsafe { QQMusicGenCoverURL(std::ptr::null(), album.as_ptr()) }.is_null());
}

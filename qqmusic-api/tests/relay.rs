mod common;

use std::time::Duration;

use common::{EXPRESS, LYRIC, MUSICU, PLAYLIST, client, config};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use qqmusic_api::endpoint::Operation;
use qqmusic_api::types::{Quality, UrlSource};
use qqmusic_api::{ErrorKind, QqMusicClient, QqMusicError};
use serde_json::json;

const SUMMARY: &str = r#"{"code":0,"cdlist":[{"disstid":"123","dissname":"Mix","songnum":0}]}"#;

#[test]
fn song_url_falls_back_to_mirror_after_retrying_primary() {
    let server = MockServer::start();
    let primary = server.mock(|when, then| {
        when.method(POST).path(MUSICU);
        then.status(503);
    });
    let mirror = server.mock(|when, then| {
        when.method(GET)
            .path(EXPRESS)
            .query_param("songmid", "0039MnYb0qxYhV")
            .query_param("filename", "C4000039MnYb0qxYhV0039MnYb0qxYhV.m4a");
        then.status(200).json_body(json!({
            "code": 0,
            "data": { "items": [{ "filename": "C4000039MnYb0qxYhV0039MnYb0qxYhV.m4a", "vkey": "VK1" }] }
        }));
    });

    let client = client(&server);
    let url = client
        .song_url("0039MnYb0qxYhV", Quality::Aac, None)
        .unwrap();

    primary.assert_hits(2);
    mirror.assert_hits(1);
    assert_eq!(url.source, UrlSource::Mirror);
    assert!(url.url.starts_with(&server.url(
        "/stream/C4000039MnYb0qxYhV0039MnYb0qxYhV.m4a?vkey=VK1&guid="
    )));
    assert!(url.url.ends_with("&uin=0&fromtag=66"));
}

#[test]
fn song_url_prefers_primary() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path(MUSICU)
            .json_body_partial(r#"{"req":{"module":"music.vkey.GetVkey","method":"UrlGetVkey"}}"#);
        then.status(200).json_body(json!({
            "code": 0,
            "req": { "code": 0, "data": {
                "midurlinfo": [{ "purl": "M800abcabc.mp3?vkey=V" }],
                "sip": ["https://ws.stream.qqmusic.qq.com/"]
            }}
        }));
    });
    let mirror = server.mock(|when, then| {
        when.method(GET).path(EXPRESS);
        then.status(200);
    });

    let url = client(&server).song_url("abc", Quality::High, None).unwrap();
    assert_eq!(url.url, "https://ws.stream.qqmusic.qq.com/M800abcabc.mp3?vkey=V");
    assert_eq!(url.source, UrlSource::Primary);
    mirror.assert_hits(0);
}

#[test]
fn unusable_payload_moves_on_without_retry() {
    let server = MockServer::start();
    let broken = server.mock(|when, then| {
        when.method(GET).path("/broken");
        then.status(200).body("<html>busy</html>");
    });
    let missing = server.mock(|when, then| {
        when.method(GET).path("/missing");
        then.status(404);
    });
    let good = server.mock(|when, then| {
        when.method(GET).path(PLAYLIST);
        then.status(200).body(SUMMARY);
    });

    let mut cfg = config(&server);
    cfg.relay.endpoints.set_urls(
        Operation::Playlist,
        [server.url("/broken"), server.url("/missing"), server.url(PLAYLIST)],
    );
    let client = QqMusicClient::with_config(cfg).unwrap();
    let playlist = client.playlist("123", None).unwrap();

    assert_eq!(playlist.title, "Mix");
    broken.assert_hits(1);
    missing.assert_hits(1);
    good.assert_hits(1);
}

#[test]
fn upstream_error_stops_the_chain() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(GET).path(LYRIC);
        then.status(200).body(r#"MusicJsonCallback({"retcode":-1,"code":1000,"msg":"need login"})"#);
    });
    let second = server.mock(|when, then| {
        when.method(GET).path("/lyric-mirror");
        then.status(200).json_body(json!({ "code": 0, "lyric": "[00:00.00]x" }));
    });

    let mut cfg = config(&server);
    cfg.relay
        .endpoints
        .set_urls(Operation::Lyric, [server.url(LYRIC), server.url("/lyric-mirror")]);
    let client = QqMusicClient::with_config(cfg).unwrap();

    assert!(matches!(client.lyric("abc", None), Err(QqMusicError::AuthRequired)));
    first.assert_hits(1);
    second.assert_hits(0);
}

#[test]
fn exhaustion_is_classified_by_failure_kind() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(PLAYLIST);
        then.status(200).body("not json");
    });
    let err = client(&server).playlist("123", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    let QqMusicError::AllEndpointsFailed { operation, failures } = &err else {
        panic!("expected exhaustion, got {err:?}");
    };
    assert_eq!(*operation, Operation::Playlist);
    assert_eq!(failures.len(), 1);

    let mut cfg = config(&server);
    // nothing listens on port 9 in the test environment
    cfg.relay
        .endpoints
        .set_urls(Operation::Playlist, ["http://127.0.0.1:9/p".to_owned(), server.url(PLAYLIST)]);
    let err = QqMusicClient::with_config(cfg)
        .unwrap()
        .playlist("123", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[test]
fn slow_endpoint_times_out_and_falls_through() {
    let server = MockServer::start();
    let slow = server.mock(|when, then| {
        when.method(GET).path("/slow");
        then.status(200).delay(Duration::from_millis(1500)).body(SUMMARY);
    });
    let fast = server.mock(|when, then| {
        when.method(GET).path(PLAYLIST);
        then.status(200).body(SUMMARY);
    });

    let mut cfg = config(&server);
    cfg.relay.timeout = Duration::from_millis(200);
    cfg.relay
        .endpoints
        .set_urls(Operation::Playlist, [server.url("/slow"), server.url(PLAYLIST)]);
    let client = QqMusicClient::with_config(cfg).unwrap();

    assert_eq!(client.playlist("123", None).unwrap().id, "123");
    slow.assert_hits(2);
    fast.assert_hits(1);
}

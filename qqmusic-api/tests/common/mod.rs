#![allow(dead_code)]

use std::time::Duration;

use httpmock::MockServer;
use qqmusic_api::endpoint::Operation;
use qqmusic_api::{BridgeConfig, QqMusicClient};

pub const QR_SHOW: &str = "/ptqrshow";
pub const QR_POLL: &str = "/ptqrlogin";
pub const MUSICU: &str = "/cgi-bin/musicu.fcg";
pub const PLAYLIST: &str = "/qzone/fcg-bin/fcg_ucc_getcdinfo_byids_cp.fcg";
pub const LYRIC: &str = "/lyric/fcg-bin/fcg_query_lyric_new.fcg";
pub const EXPRESS: &str = "/base/fcg-bin/fcg_music_express_mobile3.fcg";
pub const PROFILE: &str = "/rsc/fcgi-bin/fcg_get_profile_homepage.fcg";

/// Config with every operation pointed at a single endpoint on `server`.
pub fn config(server: &MockServer) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.relay.timeout = Duration::from_secs(2);
    config.relay.stream_base = server.url("/stream/");
    for (op, path) in [
        (Operation::QrShow, QR_SHOW),
        (Operation::QrPoll, QR_POLL),
        (Operation::Musicu, MUSICU),
        (Operation::Playlist, PLAYLIST),
        (Operation::Lyric, LYRIC),
        (Operation::SongUrlMirror, EXPRESS),
        (Operation::Profile, PROFILE),
    ] {
        config.relay.endpoints.set_urls(op, [server.url(path)]);
    }
    config
}

pub fn client(server: &MockServer) -> QqMusicClient {
    QqMusicClient::with_config(config(server)).unwrap()
}

pub fn ptui(code: &str, redirect: &str) -> String {
    format!("ptuiCB('{code}','0','{redirect}','0','msg', 'nick')")
}

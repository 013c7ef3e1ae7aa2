//! QQ Music API client library.
//!
//! Provides QR-code login and access to playlists, song URLs, lyrics, search,
//! album/MV detail and the user profile of the QQ Music web upstream.
//!
//! # Login
//!
//! A login is a QR code the user scans with the mobile app. The host shows
//! the code and polls until the attempt reaches a terminal state:
//!
//! ```no_run
//! use qqmusic_api::QqMusicClient;
//! use qqmusic_api::login::LoginPhase;
//!
//! let client = QqMusicClient::new().unwrap();
//! let state = client.start_login();
//! // show state.qr_payload to the user...
//! loop {
//!     let state = client.poll_login(&state.key).unwrap();
//!     if state.phase.is_terminal() {
//!         if let LoginPhase::Confirmed(session) = state.phase {
//!             println!("logged in as {:?}", session.uin());
//!         }
//!         break;
//!     }
//!     std::thread::sleep(std::time::Duration::from_secs(2));
//! }
//! ```
//!
//! The confirmed session is kept in the client's [`SessionStore`] and its
//! cookie is attached to later requests unless the caller passes one.
//!
//! # API mapping
//!
//! | Method                                | Upstream                                        | Description          |
//! |---------------------------------------|-------------------------------------------------|----------------------|
//! | [`QqMusicClient::start_login`]        | `ptqrshow`                                      | New QR login         |
//! | [`QqMusicClient::poll_login`]         | `ptqrlogin`                                     | QR login status      |
//! | [`QqMusicClient::playlist`]           | `fcg_ucc_getcdinfo_byids_cp` (`onlysong=0`)     | Playlist metadata    |
//! | [`QqMusicClient::playlist_detail`]    | same, then `onlysong=1`                         | Playlist with tracks |
//! | [`QqMusicClient::song_url`]           | musicu `GetVkey`, then `fcg_music_express_mobile3` | Playback URL     |
//! | [`QqMusicClient::lyric`]              | `fcg_query_lyric_new`                           | LRC lyrics           |
//! | [`QqMusicClient::search_songs`] etc.  | musicu `DoSearchForQQMusicDesktop`              | Search               |
//! | [`QqMusicClient::album_info`]         | musicu `GetAlbumDetail`                         | Album metadata       |
//! | [`QqMusicClient::mv_info`]            | musicu `get_video_info_batch`                   | MV metadata          |
//! | [`QqMusicClient::user_info`]          | `fcg_get_profile_homepage`                      | Current user profile |
//! | [`cover_url`]                         | (no request)                                    | Cover image URL      |
//!
//! Every upstream operation goes through the [`relay`], which tries the
//! operation's endpoints in order (see [`endpoint`]).

pub mod client;
pub mod config;
mod cover;
pub mod endpoint;
pub mod error;
pub mod login;
mod media;
mod playlist;
pub mod relay;
mod search;
pub mod session;
mod sign;
mod track;
pub mod types;
mod user;
mod wire;

pub use client::QqMusicClient;
pub use config::{BridgeConfig, ConfigOverrides, RelayConfig};
pub use cover::cover_url;
pub use error::{ErrorKind, QqMusicError, Result};
pub use login::{LoginPhase, QrLoginState, QrPayload};
pub use search::PAGE_SIZE;
pub use session::{Session, SessionStore};

//! C ABI for the QQ Music bridge.
//!
//! All functions are synchronous and may block for the duration of the
//! upstream calls they make. Strings go in as NUL-terminated UTF-8 and are
//! only read; strings coming out are owned by the bridge and must be handed
//! back to [`QQMusicFreeString`] exactly once.
//!
//! Login calls (`QQMusicStartLogin`, `QQMusicPollLoginStatus`,
//! `QQMusicCancelLogin`, `QQMusicLogout`) must not be issued concurrently.
//! Resolver calls may run on any thread.

#![allow(unsafe_code, non_snake_case)]

mod envelope;

use std::ffi::{CStr, c_char, c_int};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use qqmusic_api::login::QrLoginState;
use qqmusic_api::types::Quality;
use qqmusic_api::{BridgeConfig, QqMusicClient, QqMusicError, cover_url};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Process-wide bridge instance, created on first use.
static BRIDGE: RwLock<Option<Arc<QqMusicClient>>> = RwLock::new(None);

fn bridge() -> Result<Arc<QqMusicClient>, QqMusicError> {
    if let Some(client) = BRIDGE.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
        return Ok(Arc::clone(client));
    }
    let mut slot = BRIDGE.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(client) = slot.as_ref() {
        return Ok(Arc::clone(client));
    }
    let client = Arc::new(QqMusicClient::new()?);
    *slot = Some(Arc::clone(&client));
    Ok(client)
}

/// Run `f` behind the panic boundary and encode its result.
fn export<T: Serialize>(name: &str, f: impl FnOnce() -> Result<T, QqMusicError>) -> *mut c_char {
    let json = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(data)) => envelope::ok(&data),
        Ok(Err(e)) => {
            tracing::debug!(export = name, error = %e, "call failed");
            envelope::err(&e)
        }
        Err(_) => {
            tracing::error!(export = name, "panic caught at FFI boundary");
            envelope::internal(&format!("panic in {name}"))
        }
    };
    envelope::into_raw(json)
}

/// Login envelopes: a `Failed` state reports its error's code and still
/// carries the snapshot as `data`.
fn export_login(name: &str, f: impl FnOnce() -> Result<QrLoginState, QqMusicError>) -> *mut c_char {
    let json = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(state)) => match state.error() {
            Some(e) => envelope::encode(envelope::error_code(e), &e.to_string(), &state),
            None => envelope::ok(&state),
        },
        Ok(Err(e)) => envelope::err(&e),
        Err(_) => {
            tracing::error!(export = name, "panic caught at FFI boundary");
            envelope::internal(&format!("panic in {name}"))
        }
    };
    envelope::into_raw(json)
}

/// # Safety
/// `p` must be null or a valid NUL-terminated string that outlives `'a`.
unsafe fn require_str<'a>(p: *const c_char, name: &str) -> Result<&'a str, QqMusicError> {
    if p.is_null() {
        return Err(QqMusicError::InvalidArgument(format!("{name} is null")));
    }
    unsafe { CStr::from_ptr(p) }
        .to_str()
        .map_err(|_| QqMusicError::InvalidArgument(format!("{name} is not valid UTF-8")))
}

/// # Safety
/// Same as [`require_str`]. Null and empty both mean "absent".
unsafe fn optional_str<'a>(p: *const c_char, name: &str) -> Result<Option<&'a str>, QqMusicError> {
    if p.is_null() {
        return Ok(None);
    }
    let s = unsafe { require_str(p, name) }?;
    Ok((!s.trim().is_empty()).then_some(s))
}

// ── login ──

/// Start a QR login, superseding any previous attempt and clearing the
/// stored session.
///
/// `data`: `{ key, state, qrPayload, mime }`.
#[unsafe(no_mangle)]
pub extern "C" fn QQMusicStartLogin() -> *mut c_char {
    export_login("QQMusicStartLogin", || Ok(bridge()?.start_login()))
}

/// Poll the attempt identified by `key`.
///
/// `data`: `{ key, state }`, plus `uin`, `cookie`, `token`, `expiresAt` once
/// `state == "Confirmed"`.
///
/// # Safety
/// `key` must be null or a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicPollLoginStatus(key: *const c_char) -> *mut c_char {
    export_login("QQMusicPollLoginStatus", || {
        let key = unsafe { require_str(key, "key") }?;
        bridge()?.poll_login(key)
    })
}

/// Drop the in-flight login attempt. The stored session is kept.
#[unsafe(no_mangle)]
pub extern "C" fn QQMusicCancelLogin() {
    let _ = catch_unwind(|| {
        if let Ok(client) = bridge() {
            client.cancel_login();
        }
    });
}

/// Clear the stored session and any login attempt.
#[unsafe(no_mangle)]
pub extern "C" fn QQMusicLogout() {
    let _ = catch_unwind(|| {
        if let Ok(client) = bridge() {
            client.logout();
        }
    });
}

// ── resolvers ──

/// # Safety
/// `playlist_id` must be a valid NUL-terminated C string; `cookie` may be null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicGetPlaylist(
    playlist_id: *const c_char,
    cookie: *const c_char,
) -> *mut c_char {
    export("QQMusicGetPlaylist", || {
        let id = unsafe { require_str(playlist_id, "playlistId") }?;
        let cookie = unsafe { optional_str(cookie, "cookie") }?;
        bridge()?.playlist(id, cookie)
    })
}

/// # Safety
/// `playlist_id` must be a valid NUL-terminated C string; `cookie` may be null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicGetPlaylistDetail(
    playlist_id: *const c_char,
    cookie: *const c_char,
) -> *mut c_char {
    export("QQMusicGetPlaylistDetail", || {
        let id = unsafe { require_str(playlist_id, "playlistId") }?;
        let cookie = unsafe { optional_str(cookie, "cookie") }?;
        bridge()?.playlist_detail(id, cookie)
    })
}

/// Resolve a playable URL. `quality` is one of `standard`, `high`,
/// `lossless`, `aac`; null or empty means `aac`.
///
/// # Safety
/// `song_id` must be a valid NUL-terminated C string; `quality` and `cookie`
/// may be null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicGetSongURL(
    song_id: *const c_char,
    quality: *const c_char,
    cookie: *const c_char,
) -> *mut c_char {
    export("QQMusicGetSongURL", || {
        let mid = unsafe { require_str(song_id, "songId") }?;
        let quality = Quality::parse(unsafe { optional_str(quality, "quality") }?.unwrap_or(""))?;
        let cookie = unsafe { optional_str(cookie, "cookie") }?;
        bridge()?.song_url(mid, quality, cookie)
    })
}

/// # Safety
/// `song_id` must be a valid NUL-terminated C string; `cookie` may be null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicGetLyric(song_id: *const c_char, cookie: *const c_char) -> *mut c_char {
    export("QQMusicGetLyric", || {
        let mid = unsafe { require_str(song_id, "songId") }?;
        let cookie = unsafe { optional_str(cookie, "cookie") }?;
        bridge()?.lyric(mid, cookie)
    })
}

/// # Safety
/// `keyword` must be a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicSearchSong(keyword: *const c_char, page: u32) -> *mut c_char {
    export("QQMusicSearchSong", || {
        let keyword = unsafe { require_str(keyword, "keyword") }?;
        bridge()?.search_songs(keyword, page)
    })
}

/// # Safety
/// `keyword` must be a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicSearchAlbum(keyword: *const c_char, page: u32) -> *mut c_char {
    export("QQMusicSearchAlbum", || {
        let keyword = unsafe { require_str(keyword, "keyword") }?;
        bridge()?.search_albums(keyword, page)
    })
}

/// # Safety
/// `keyword` must be a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicSearchMV(keyword: *const c_char, page: u32) -> *mut c_char {
    export("QQMusicSearchMV", || {
        let keyword = unsafe { require_str(keyword, "keyword") }?;
        bridge()?.search_mvs(keyword, page)
    })
}

/// # Safety
/// `keyword` must be a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicSearchSinger(keyword: *const c_char, page: u32) -> *mut c_char {
    export("QQMusicSearchSinger", || {
        let keyword = unsafe { require_str(keyword, "keyword") }?;
        bridge()?.search_singers(keyword, page)
    })
}

/// # Safety
/// `album_id` must be a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicGetAlbumInfo(album_id: *const c_char) -> *mut c_char {
    export("QQMusicGetAlbumInfo", || {
        let mid = unsafe { require_str(album_id, "albumId") }?;
        bridge()?.album_info(mid)
    })
}

/// # Safety
/// `mv_id` must be a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicGetMVInfo(mv_id: *const c_char) -> *mut c_char {
    export("QQMusicGetMVInfo", || {
        let vid = unsafe { require_str(mv_id, "mvId") }?;
        bridge()?.mv_info(vid)
    })
}

/// Profile of the logged-in user (or of the `cookie` owner).
///
/// # Safety
/// `cookie` must be null or a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicGetUserInfo(cookie: *const c_char) -> *mut c_char {
    export("QQMusicGetUserInfo", || {
        let cookie = unsafe { optional_str(cookie, "cookie") }?;
        bridge()?.user_info(cookie)
    })
}

/// Cover image URL as a plain string (no envelope). Null when the id is
/// empty or the content type is not recognized.
///
/// # Safety
/// Both arguments must be null or valid NUL-terminated C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicGenCoverURL(
    content_id: *const c_char,
    content_type: *const c_char,
) -> *mut c_char {
    let url = catch_unwind(|| {
        let id = unsafe { require_str(content_id, "contentId") }.ok()?;
        let kind = unsafe { require_str(content_type, "contentType") }.ok()?;
        cover_url(id, kind).ok()
    });
    match url {
        Ok(Some(url)) => envelope::into_raw(url),
        _ => std::ptr::null_mut(),
    }
}

// ── configuration / runtime ──

/// Replace the bridge instance with one built from a JSON override document
/// (see `ConfigOverrides`). The stored session carries over; an in-flight
/// login attempt does not.
///
/// # Safety
/// `config_json` must be a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicConfigure(config_json: *const c_char) -> *mut c_char {
    export("QQMusicConfigure", || {
        let json = unsafe { require_str(config_json, "configJson") }?;
        let config = BridgeConfig::from_json(json)?;
        let mut slot = BRIDGE.write().unwrap_or_else(PoisonError::into_inner);
        let client = match slot.as_ref() {
            Some(old) => QqMusicClient::with_store(config, Arc::clone(old.session_store()))?,
            None => QqMusicClient::with_config(config)?,
        };
        *slot = Some(Arc::new(client));
        tracing::info!("bridge reconfigured");
        Ok(())
    })
}

/// Install a stderr `tracing` subscriber. `filter` uses `RUST_LOG` syntax;
/// null or empty means `info`.
///
/// Returns `0` on success, `1` when logging was already enabled, `2` for an
/// invalid filter.
///
/// # Safety
/// `filter` must be null or a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicEnableLogging(filter: *const c_char) -> c_int {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    catch_unwind(|| {
        let directives = match unsafe { optional_str(filter, "filter") } {
            Ok(f) => f.unwrap_or("info"),
            Err(_) => return 2,
        };
        let Ok(filter) = EnvFilter::try_new(directives) else {
            return 2;
        };
        if INSTALLED.set(()).is_err() {
            return 1;
        }
        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init();
        i32::from(installed.is_err())
    })
    .unwrap_or(2)
}

/// Release a string returned by any other `QQMusic*` function. Null is a
/// no-op.
///
/// # Safety
/// `s` must be null or a pointer returned by this library that has not been
/// released yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn QQMusicFreeString(s: *mut c_char) {
    unsafe { envelope::release(s) };
}

/// Number of bridge-allocated strings not yet released.
#[unsafe(no_mangle)]
pub extern "C" fn QQMusicLiveStringCount() -> usize {
    envelope::live()
}

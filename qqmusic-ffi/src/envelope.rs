//! Result envelopes and the bridge-owned string allocator.
//!
//! Every allocating export returns one NUL-terminated UTF-8 JSON document:
//!
//! ```json
//! { "code": 0, "message": "ok", "data": { ... } }
//! ```
//!
//! | code | meaning                                    |
//! |------|--------------------------------------------|
//! | 0    | success                                    |
//! | 1001 | network (all endpoints exhausted)          |
//! | 1002 | upstream error, `data.upstreamCode` is set |
//! | 1003 | malformed upstream payload                 |
//! | 1004 | session expired                            |
//! | 1005 | unknown or stale login key                 |
//! | 1006 | authentication required                    |
//! | 1007 | invalid argument                           |
//! | 1099 | internal error (caught panic)              |

use std::ffi::{CString, c_char};
use std::sync::atomic::{AtomicUsize, Ordering};

use qqmusic_api::{ErrorKind, QqMusicError};
use serde::Serialize;
use serde_json::{Value, json};

pub(crate) const CODE_OK: i32 = 0;
pub(crate) const CODE_INTERNAL: i32 = 1099;

/// Bridge strings handed out and not yet released.
static LIVE_STRINGS: AtomicUsize = AtomicUsize::new(0);

const FALLBACK: &str = r#"{"code":1099,"message":"failed to encode result","data":null}"#;

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    code: i32,
    message: &'a str,
    data: T,
}

pub(crate) fn error_code(e: &QqMusicError) -> i32 {
    match e.kind() {
        ErrorKind::Network => 1001,
        ErrorKind::Upstream => 1002,
        ErrorKind::Parse => 1003,
        ErrorKind::SessionExpired => 1004,
        ErrorKind::InvalidKey => 1005,
        ErrorKind::AuthRequired => 1006,
        ErrorKind::InvalidArgument => 1007,
    }
}

/// Extra context attached to an error envelope.
fn error_data(e: &QqMusicError) -> Value {
    match e {
        QqMusicError::Upstream { code, .. } => json!({ "upstreamCode": code }),
        QqMusicError::AllEndpointsFailed {
            operation,
            failures,
        } => json!({
            "operation": operation.name(),
            "failures": failures
                .iter()
                .map(|f| json!({ "url": f.url, "message": f.message }))
                .collect::<Vec<_>>(),
        }),
        _ => Value::Null,
    }
}

pub(crate) fn encode<T: Serialize>(code: i32, message: &str, data: &T) -> String {
    serde_json::to_string(&Envelope {
        code,
        message,
        data,
    })
    .unwrap_or_else(|e| {
        tracing::error!(error = %e, "envelope serialization failed");
        FALLBACK.to_owned()
    })
}

pub(crate) fn ok<T: Serialize>(data: &T) -> String {
    encode(CODE_OK, "ok", data)
}

pub(crate) fn err(e: &QqMusicError) -> String {
    encode(error_code(e), &e.to_string(), &error_data(e))
}

pub(crate) fn internal(message: &str) -> String {
    encode(CODE_INTERNAL, message, &Value::Null)
}

/// Hand `s` to the host. Released with `QQMusicFreeString`.
pub(crate) fn into_raw(s: String) -> *mut c_char {
    let c = CString::new(s).unwrap_or_else(|_| {
        tracing::error!("result contained an interior NUL");
        CString::from(c"{\"code\":1099,\"message\":\"interior NUL in result\",\"data\":null}")
    });
    LIVE_STRINGS.fetch_add(1, Ordering::SeqCst);
    c.into_raw()
}

/// # Safety
/// `s` must come from [`into_raw`] and not have been released yet.
pub(crate) unsafe fn release(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(s) });
    LIVE_STRINGS.fetch_sub(1, Ordering::SeqCst);
}

pub(crate) fn live() -> usize {
    LIVE_STRINGS.load(Ordering::SeqCst)
}

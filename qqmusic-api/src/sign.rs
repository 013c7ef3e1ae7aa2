//! Request signing helpers for the QQ web endpoints.
//!
//! - `ptqrtoken`: `hash33(qrsig, 0)`, sent when polling a QR code
//! - `g_tk`     : `hash33(p_skey or skey, 5381)`, sent with musicu requests
//!
//! `hash33` is the classic `h = h * 33 + c` string hash masked to 31 bits.

use rand::Rng;

pub(crate) fn hash33(input: &str, seed: i64) -> i64 {
    let mut hash = seed;
    for c in input.chars() {
        hash = hash.wrapping_shl(5).wrapping_add(hash).wrapping_add(i64::from(u32::from(c)));
    }
    hash & 0x7fff_ffff
}

/// `g_tk` for a cookie header, falling back to the anonymous value `5381`.
pub(crate) fn g_tk(cookie: Option<&str>) -> i64 {
    let Some(cookie) = cookie else { return 5381 };
    let key = cookie_value(cookie, "p_skey").or_else(|| cookie_value(cookie, "skey"));
    key.map_or(5381, |k| hash33(k, 5381))
}

/// Value of `name` inside a `a=1; b=2` cookie header.
pub(crate) fn cookie_value<'a>(cookie: &'a str, name: &str) -> Option<&'a str> {
    cookie
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v)
}

/// Random 10-digit client guid used by the vkey endpoints.
pub(crate) fn guid() -> String {
    rand::rng().random_range(1_000_000_000_u64..10_000_000_000).to_string()
}

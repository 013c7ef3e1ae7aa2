//! User profile API.
//!
//! Endpoint: `GET /rsc/fcgi-bin/fcg_get_profile_homepage.fcg`
//!
//! Query: `format=json&cid=205360838&userid=<uin>&reqfrom=1`, authenticated
//! by cookie.
//!
//! Response:
//! ```json
//! {
//!   "code": 0,
//!   "data": {
//!     "creator": { "nick": "用户名", "headpic": "https://thirdqq.qlogo.cn/..." }
//!   }
//! }
//! ```
//!
//! Returns code 1000 if the cookie is invalid or expired.

use chrono::Utc;

use crate::client::{QqMusicClient, normalize_uin};
use crate::endpoint::Operation;
use crate::error::{QqMusicError, Result};
use crate::relay::Params;
use crate::sign::{cookie_value, g_tk};
use crate::types::UserProfile;
use crate::wire::ProfileResp;

const PROFILE_CID: &str = "205360838";

impl QqMusicClient {
    /// Profile of the logged-in user.
    ///
    /// The uin is read from the cookie (`uin=o0…`), else from the stored
    /// session.
    ///
    /// # Errors
    ///
    /// - [`QqMusicError::AuthRequired`]: no credential, or the credential
    ///   carries no uin
    /// - [`QqMusicError::SessionExpired`]: credential rejected (code 1000)
    pub fn user_info(&self, cookie: Option<&str>) -> Result<UserProfile> {
        let cookie = self.effective_cookie(cookie).ok_or_else(|| self.restricted(None))?;
        let uin = cookie_value(&cookie, "uin")
            .map(normalize_uin)
            .or_else(|| {
                self.store
                    .get()
                    .filter(|s| !s.is_expired(Utc::now()) && s.cookie() == cookie)
                    .and_then(|s| s.uin().map(str::to_owned))
            })
            .filter(|u| u != "0")
            .ok_or(QqMusicError::AuthRequired)?;

        let params = Params::new()
            .query("format", "json")
            .query("cid", PROFILE_CID)
            .query("userid", &uin)
            .query("reqfrom", 1)
            .query("g_tk", g_tk(Some(&cookie)));
        let resp: ProfileResp =
            match self.relay.call_json(Operation::Profile, &params, Some(&cookie)) {
                Ok(resp) => resp,
                Err(QqMusicError::Upstream { code: 1000, .. }) => {
                    return Err(QqMusicError::SessionExpired);
                }
                Err(e) => return Err(e),
            };

        let creator = resp.data.creator;
        Ok(UserProfile {
            uin,
            nickname: creator.nick,
            avatar_url: creator.headpic.filter(|h| !h.is_empty()),
        })
    }
}

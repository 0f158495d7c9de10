//! Signed cookie sessions binding a browser to one player of one game.
//!
//! Cookie value: `<base64url(json)>.<hex(hmac-sha256)>`. Nothing is stored
//! server-side; a bad or missing signature means the browser has no session.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, header::COOKIE};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac, digest::InvalidLength};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::{
    dao::{game_store::GameStore, models::GameHash, storage::StorageResult},
    state::game::Game,
};

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "wikirace_session";
const SESSION_CONTEXT: &[u8] = b"wikirace session signing v1";

/// The player and game a browser is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Player name within the game.
    pub player_name: String,
    /// Game the player joined.
    pub game_hash: GameHash,
}

impl Session {
    /// Load the game this session points to.
    pub async fn game(&self, store: &GameStore) -> StorageResult<Arc<Game>> {
        store.get_game_by_hash(&self.game_hash).await
    }

    /// Whether this session belongs to `hash`.
    pub fn is_for(&self, hash: &GameHash) -> bool {
        &self.game_hash == hash
    }
}

/// Keyed MAC used to sign and verify session cookies.
#[derive(Clone)]
pub struct SessionKeys {
    signer: HmacSha256,
}

impl SessionKeys {
    /// Derive the signing secret from the page token key so sessions survive restarts.
    pub fn derive(master_key: &[u8]) -> Result<Self, InvalidLength> {
        let mut derivation = HmacSha256::new_from_slice(master_key)?;
        derivation.update(SESSION_CONTEXT);
        let secret = derivation.finalize().into_bytes();
        Ok(Self {
            signer: HmacSha256::new_from_slice(&secret)?,
        })
    }

    fn mac(&self) -> HmacSha256 {
        self.signer.clone()
    }

    /// Encode and sign a session, returning the cookie value.
    pub fn sign(&self, session: &Session) -> String {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(session).unwrap_or_default());
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        format!("{payload}.{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Verify a cookie value produced by [`SessionKeys::sign`].
    pub fn verify(&self, value: &str) -> Option<Session> {
        let (payload, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            debug!("session cookie signature mismatch");
            return None;
        }
        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// `Set-Cookie` value binding the browser to `player_name` in `game_hash`.
    pub fn init(&self, player_name: &str, game_hash: &GameHash) -> HeaderValue {
        let session = Session {
            player_name: player_name.to_string(),
            game_hash: game_hash.clone(),
        };
        let cookie = format!(
            "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
            self.sign(&session)
        );
        // Base64url, hex and fixed attributes only.
        HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    /// Session carried by the request cookies, if any and correctly signed.
    pub fn read(&self, headers: &HeaderMap) -> Option<Session> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == SESSION_COOKIE)
            .find_map(|(_, value)| self.verify(value))
    }

    /// `Set-Cookie` value that clears the session.
    pub fn invalidate() -> HeaderValue {
        HeaderValue::from_static("wikirace_session=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::derive(b"0123456789abcdef").unwrap()
    }

    fn request_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    fn cookie_pair(set_cookie: &HeaderValue) -> String {
        set_cookie.to_str().unwrap().split(';').next().unwrap().to_string()
    }

    #[test]
    fn init_then_read_round_trips() {
        let keys = keys();
        let set_cookie = keys.init("ada", &GameHash::new("cafe"));
        let headers = request_with_cookie(&format!("theme=dark; {}", cookie_pair(&set_cookie)));

        let session = keys.read(&headers).unwrap();
        assert_eq!(session.player_name, "ada");
        assert!(session.is_for(&GameHash::new("cafe")));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let keys = keys();
        let signed = keys.sign(&Session {
            player_name: "ada".into(),
            game_hash: GameHash::new("cafe"),
        });
        let (_, signature) = signed.rsplit_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"playerName":"eve","gameHash":"cafe"}"#);
        let forged = format!("{forged_payload}.{signature}");
        assert!(keys.verify(&forged).is_none());
        assert!(keys.verify(&signed).is_some());
    }

    #[test]
    fn other_key_cannot_verify() {
        let signed = keys().sign(&Session {
            player_name: "ada".into(),
            game_hash: GameHash::new("cafe"),
        });
        assert!(SessionKeys::derive(b"another key").unwrap().verify(&signed).is_none());
    }

    #[test]
    fn missing_or_garbage_cookie_means_no_session() {
        let keys = keys();
        assert!(keys.read(&HeaderMap::new()).is_none());
        assert!(keys.read(&request_with_cookie("wikirace_session=garbage")).is_none());
        assert!(keys.read(&request_with_cookie("wikirace_session=abc.zz")).is_none());
    }

    #[test]
    fn invalidate_expires_cookie() {
        let cookie = SessionKeys::invalidate();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("wikirace_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}

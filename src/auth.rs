//! Signed session tokens binding a connection to `(roomName, playerName)`
//!
//! Format: `base64url(json claims) "." hex(hmac_sha256(claims))`

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{GameError, GameResult};
use crate::types::{PlayerName, RoomName};

type HmacSha256 = Hmac<Sha256>;

/// What a verified token vouches for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub room_name: RoomName,
    /// Identity of the room instance, so a token dies with its room even if the name is reused
    pub room_id: String,
    pub player_name: PlayerName,
    /// Unix timestamp (seconds)
    pub issued_at: i64,
}

#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Signer with a fresh random key; tokens die with the process
    pub fn random() -> Self {
        let mut key = vec![0u8; 32];
        rand::rng().fill_bytes(&mut key);
        Self { key }
    }

    fn mac(&self) -> HmacSha256 {
        <HmacSha256 as Mac>::new_from_slice(&self.key).expect("hmac accepts any key length")
    }

    pub fn issue(&self, room_name: &str, room_id: &str, player_name: &str) -> String {
        let claims = SessionClaims {
            room_name: room_name.to_string(),
            room_id: room_id.to_string(),
            player_name: player_name.to_string(),
            issued_at: chrono::Utc::now().timestamp(),
        };
        // Serializing two strings and an integer cannot fail
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        format!("{}.{}", payload, signature)
    }

    pub fn verify(&self, token: &str) -> GameResult<SessionClaims> {
        let (payload, signature) = token.split_once('.').ok_or(GameError::InvalidToken)?;
        let signature = hex::decode(signature).map_err(|_| GameError::InvalidToken)?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| GameError::InvalidToken)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| GameError::InvalidToken)?;
        serde_json::from_slice(&json).map_err(|_| GameError::InvalidToken)
    }
}

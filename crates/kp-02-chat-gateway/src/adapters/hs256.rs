//! HMAC-SHA256 (`HS256`) compact token verifier.

use crate::domain::{decode_claims, Claims, TokenError};
use crate::ports::{SystemClock, TokenVerifier, WallClock};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Verifies `header.payload.signature` tokens signed with a shared secret.
#[derive(Clone)]
pub struct Hs256Verifier {
    key: Vec<u8>,
    clock: Arc<dyn WallClock>,
}

impl Hs256Verifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: impl AsRef<[u8]>, clock: Arc<dyn WallClock>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
            clock,
        }
    }

    fn mac(&self, signing_input: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| TokenError::BadSignature)?;
        mac.update(signing_input);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Sign claims with this verifier's secret.
    pub fn issue(&self, claims: &Claims) -> Result<String, TokenError> {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = serde_json::to_vec(claims).map_err(|e| TokenError::InvalidClaim {
            claim: "payload",
            reason: e.to_string(),
        })?;
        let signing_input = format!("{header}.{}", URL_SAFE_NO_PAD.encode(body));
        let signature = URL_SAFE_NO_PAD.encode(self.mac(signing_input.as_bytes())?);
        Ok(format!("{signing_input}.{signature}"))
    }
}

fn decode_segment(segment: &str, name: &'static str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Encoding { segment: name })
}

impl TokenVerifier for Hs256Verifier {
    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let parsed: Header = serde_json::from_slice(&decode_segment(header, "header")?)
            .map_err(|_| TokenError::Malformed)?;
        if parsed.alg != ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm { alg: parsed.alg });
        }

        let provided = decode_segment(signature, "signature")?;
        let signing_input_len = header.len() + 1 + payload.len();
        let expected = self.mac(&token.as_bytes()[..signing_input_len])?;
        if !bool::from(expected.as_slice().ct_eq(&provided)) {
            return Err(TokenError::BadSignature);
        }

        let claims = decode_claims(&decode_segment(payload, "payload")?)?;
        if let Some(exp) = claims.exp {
            if exp <= self.clock.now_secs() {
                return Err(TokenError::Expired { expired_at: exp });
            }
        }
        Ok(claims)
    }
}

//! Typed bearer token claims.

use super::error::TokenError;
use kp_01_conversation_store::{ProfileBasics, UserProfile};
use serde::{Deserialize, Serialize};

/// Claims of a verified token. `sub` is the participant id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawClaims")]
pub struct Claims {
    pub aud: String,
    pub sub: String,
    pub name: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(rename = "profileImage", skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiry, seconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl Claims {
    /// Profile stored for the subject at session bootstrap.
    pub fn to_profile(&self) -> UserProfile {
        UserProfile {
            basics: ProfileBasics {
                id: self.sub.clone(),
                first_name: self.first_name.clone(),
                last_name: self.last_name.clone(),
                image: self.profile_image.clone(),
            },
            email: self.email.clone(),
        }
    }
}

#[derive(Deserialize)]
struct RawClaims {
    aud: Option<String>,
    sub: Option<String>,
    name: Option<String>,
    #[serde(rename = "firstName")]
    first_name: Option<String>,
    #[serde(rename = "lastName")]
    last_name: Option<String>,
    #[serde(rename = "profileImage")]
    profile_image: Option<String>,
    email: Option<String>,
    exp: Option<u64>,
}

fn required(value: Option<String>, claim: &'static str) -> Result<String, TokenError> {
    value.ok_or(TokenError::MissingClaim { claim })
}

impl TryFrom<RawClaims> for Claims {
    type Error = TokenError;

    fn try_from(raw: RawClaims) -> Result<Self, Self::Error> {
        let sub = required(raw.sub, "sub")?;
        if sub.is_empty() {
            return Err(TokenError::InvalidClaim {
                claim: "sub",
                reason: "empty subject".into(),
            });
        }
        Ok(Self {
            aud: required(raw.aud, "aud")?,
            sub,
            name: required(raw.name, "name")?,
            first_name: required(raw.first_name, "firstName")?,
            last_name: required(raw.last_name, "lastName")?,
            profile_image: raw.profile_image,
            email: raw.email,
            exp: raw.exp,
        })
    }
}

/// Decode a JSON claims payload, keeping the typed reason on failure.
pub fn decode_claims(payload: &[u8]) -> Result<Claims, TokenError> {
    let raw: RawClaims = serde_json::from_slice(payload).map_err(|e| TokenError::InvalidClaim {
        claim: "payload",
        reason: e.to_string(),
    })?;
    Claims::try_from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_decode_full_claims() {
        let claims = decode_claims(&payload(json!({
            "aud": "web", "sub": "u1", "name": "Ada L",
            "firstName": "Ada", "lastName": "Lovelace",
            "profileImage": "https://img/ada.png", "exp": 99
        })))
        .unwrap();

        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.exp, Some(99));
        let profile = claims.to_profile();
        assert_eq!(profile.basics.display_name(), "Ada Lovelace");
        assert_eq!(profile.basics.image.as_deref(), Some("https://img/ada.png"));
        assert_eq!(profile.email, None);
    }

    #[test]
    fn test_missing_claim_is_typed() {
        let err = decode_claims(&payload(json!({
            "aud": "web", "sub": "u1", "name": "Ada L", "firstName": "Ada"
        })))
        .unwrap_err();
        assert_eq!(err, TokenError::MissingClaim { claim: "lastName" });

        let err = decode_claims(&payload(json!({"aud": "web"}))).unwrap_err();
        assert_eq!(err, TokenError::MissingClaim { claim: "sub" });
    }

    #[test]
    fn test_wrong_type_is_invalid() {
        let err = decode_claims(&payload(json!({"sub": 42}))).unwrap_err();
        assert!(matches!(err, TokenError::InvalidClaim { claim: "payload", .. }));
    }

    #[test]
    fn test_serde_path_uses_same_rules() {
        let parsed: Result<Claims, _> = serde_json::from_value(json!({"sub": "u1"}));
        assert!(parsed.is_err());
    }
}

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

// Bearer credential minted by the external session issuer. The messaging
// server only ever holds the issuer's public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub user_id: String,
    pub valid_until: DateTime<Utc>,
    pub signature: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid session token format")]
    InvalidFormat,

    #[error("Session token has expired")]
    Expired,

    #[error("Invalid session token signature")]
    InvalidSignature,

    #[error("Session token carries no user id")]
    EmptyUserId,

    #[error("Base64 decode error")]
    Base64Decode,
}

// payload = user_id || 0x00 || valid_until (rfc3339)
fn signing_payload(user_id: &str, valid_until: &DateTime<Utc>) -> Vec<u8> {
    let mut payload = Vec::with_capacity(user_id.len() + 40);
    payload.extend_from_slice(user_id.as_bytes());
    payload.push(0);
    payload.extend_from_slice(valid_until.to_rfc3339().as_bytes());
    payload
}

impl SessionToken {
    /// Sign a session for `user_id` that stays valid until `valid_until`.
    pub fn issue(user_id: &str, valid_until: DateTime<Utc>, issuer_key: &SigningKey) -> Self {
        let signature = issuer_key.sign(&signing_payload(user_id, &valid_until));

        Self {
            user_id: user_id.to_string(),
            valid_until,
            signature: signature.to_bytes().to_vec(),
        }
    }

    /// Check expiry and the issuer signature.
    pub fn verify_with_key(&self, issuer_pubkey: &[u8; 32]) -> Result<(), SessionError> {
        if self.user_id.is_empty() {
            return Err(SessionError::EmptyUserId);
        }

        if Utc::now() > self.valid_until {
            return Err(SessionError::Expired);
        }

        let verifying_key =
            VerifyingKey::from_bytes(issuer_pubkey).map_err(|_| SessionError::InvalidSignature)?;
        let signature =
            Signature::from_slice(&self.signature).map_err(|_| SessionError::InvalidSignature)?;

        verifying_key
            .verify(&signing_payload(&self.user_id, &self.valid_until), &signature)
            .map_err(|_| SessionError::InvalidSignature)
    }

    /// Encode as a base64url string suitable for an `Authorization` header.
    pub fn encode(&self) -> Result<String, SessionError> {
        let bytes = bincode::serialize(self).map_err(|_| SessionError::InvalidFormat)?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn decode(code: &str) -> Result<Self, SessionError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(code.trim())
            .map_err(|_| SessionError::Base64Decode)?;
        bincode::deserialize(&bytes).map_err(|_| SessionError::InvalidFormat)
    }
}

/// Decode and verify an encoded token, returning the user id it vouches for.
pub fn resolve_user_id(code: &str, issuer_pubkey: &[u8; 32]) -> Result<String, SessionError> {
    let token = SessionToken::decode(code)?;
    token.verify_with_key(issuer_pubkey)?;
    Ok(token.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::rngs::OsRng;

    #[test]
    fn test_session_token_valid() {
        let issuer = SigningKey::generate(&mut OsRng);
        let pubkey = issuer.verifying_key().to_bytes();

        let token = SessionToken::issue("u1", Utc::now() + Duration::days(30), &issuer);
        let code = token.encode().unwrap();

        assert_eq!(resolve_user_id(&code, &pubkey).unwrap(), "u1");
    }

    #[test]
    fn test_session_token_expired() {
        let issuer = SigningKey::generate(&mut OsRng);
        let pubkey = issuer.verifying_key().to_bytes();

        let token = SessionToken::issue("u1", Utc::now() - Duration::days(1), &issuer);

        assert!(matches!(
            token.verify_with_key(&pubkey),
            Err(SessionError::Expired)
        ));
    }

    #[test]
    fn test_session_token_wrong_issuer() {
        let issuer = SigningKey::generate(&mut OsRng);
        let other = SigningKey::generate(&mut OsRng);

        let token = SessionToken::issue("u1", Utc::now() + Duration::days(1), &issuer);

        assert!(token
            .verify_with_key(&other.verifying_key().to_bytes())
            .is_err());
    }

    #[test]
    fn test_session_token_tampered_user() {
        let issuer = SigningKey::generate(&mut OsRng);
        let pubkey = issuer.verifying_key().to_bytes();

        let mut token = SessionToken::issue("u1", Utc::now() + Duration::days(1), &issuer);
        token.user_id = "u2".to_string();

        assert!(matches!(
            token.verify_with_key(&pubkey),
            Err(SessionError::InvalidSignature)
        ));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(SessionToken::decode("not a token!").is_err());
        assert!(SessionToken::decode("AAAA").is_err());
    }
}

//! Credential resolution.

use bmessage_shared::session::resolve_user_id;
use tracing::debug;

use crate::error::{CoreError, Result};

/// Turns an opaque credential into a stable user id.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, credential: &str) -> Result<String>;
}

/// Accepts session tokens signed by a single issuer key.
pub struct SessionKeyResolver {
    issuer_pubkey: [u8; 32],
}

impl SessionKeyResolver {
    pub fn new(issuer_pubkey: [u8; 32]) -> Self {
        Self { issuer_pubkey }
    }
}

impl IdentityResolver for SessionKeyResolver {
    fn resolve(&self, credential: &str) -> Result<String> {
        let token = credential
            .trim_start()
            .strip_prefix("Bearer ")
            .unwrap_or(credential)
            .trim();
        if token.is_empty() {
            return Err(CoreError::Unauthorized);
        }

        resolve_user_id(token, &self.issuer_pubkey).map_err(|e| {
            debug!(error = %e, "rejected session token");
            CoreError::Unauthorized
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmessage_shared::SessionToken;
    use chrono::{Duration, Utc};
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn accepts_bearer_and_bare_tokens() {
        let issuer = SigningKey::generate(&mut OsRng);
        let resolver = SessionKeyResolver::new(issuer.verifying_key().to_bytes());
        let code = SessionToken::issue("alice", Utc::now() + Duration::hours(1), &issuer)
            .encode()
            .unwrap();

        assert_eq!(resolver.resolve(&format!("Bearer {code}")).unwrap(), "alice");
        assert_eq!(resolver.resolve(&code).unwrap(), "alice");
    }

    #[test]
    fn rejects_missing_and_foreign_tokens() {
        let issuer = SigningKey::generate(&mut OsRng);
        let other = SigningKey::generate(&mut OsRng);
        let resolver = SessionKeyResolver::new(issuer.verifying_key().to_bytes());
        let foreign = SessionToken::issue("alice", Utc::now() + Duration::hours(1), &other)
            .encode()
            .unwrap();

        assert!(matches!(resolver.resolve(""), Err(CoreError::Unauthorized)));
        assert!(matches!(resolver.resolve("Bearer "), Err(CoreError::Unauthorized)));
        assert!(matches!(resolver.resolve(&foreign), Err(CoreError::Unauthorized)));
    }
}

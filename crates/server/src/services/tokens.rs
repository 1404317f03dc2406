use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub kind: TokenKind,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenService {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: impl Into<String>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue_pair(&self, user_id: &str) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue(user_id, TokenKind::Access, self.access_ttl)?,
            refresh_token: self.issue(user_id, TokenKind::Refresh, self.refresh_ttl)?,
        })
    }

    pub fn issue(&self, user_id: &str, kind: TokenKind, ttl: Duration) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            kind,
            exp: (Utc::now() + ttl).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|_| AppError::Internal("Failed to create token".to_string()))
    }

    /// The user id embedded in `token`, or `None` when the token is malformed,
    /// badly signed, expired or of another kind.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Option<String> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .ok()
        .filter(|data| data.claims.kind == kind)
        .map(|data| data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", Duration::minutes(15), Duration::days(30))
    }

    #[test]
    fn fresh_access_token_yields_user_id() {
        let tokens = service().issue_pair("user-1").unwrap();
        assert_eq!(
            service().verify(&tokens.access_token, TokenKind::Access),
            Some("user-1".to_string())
        );
        assert_eq!(
            service().verify(&tokens.refresh_token, TokenKind::Refresh),
            Some("user-1".to_string())
        );
    }

    #[test]
    fn expired_token_yields_none() {
        let token = service()
            .issue("user-1", TokenKind::Access, Duration::seconds(-30))
            .unwrap();
        assert_eq!(service().verify(&token, TokenKind::Access), None);
    }

    #[test]
    fn kind_and_signature_are_checked() {
        let tokens = service().issue_pair("user-1").unwrap();
        assert_eq!(service().verify(&tokens.refresh_token, TokenKind::Access), None);

        let other = TokenService::new("other", Duration::minutes(15), Duration::days(30));
        assert_eq!(other.verify(&tokens.access_token, TokenKind::Access), None);
        assert_eq!(service().verify("not-a-token", TokenKind::Access), None);
    }
}

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::responses::Role;
use crate::auth::{AuthConfig, AuthError, AuthResult};

/// Discriminates the two token kinds signed with the shared secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub typ: TokenKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub typ: TokenKind,
}

/// Verified identity carried by an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedAccess {
    pub account_id: i32,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl JwtService {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(AuthError::Config("jwt secret must not be empty".into()));
        }

        let secret_bytes = config.jwt_secret.as_bytes();
        let encoding_key = EncodingKey::from_secret(secret_bytes);
        let decoding_key = DecodingKey::from_secret(secret_bytes);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
            access_token_ttl: Duration::seconds(config.access_token_ttl_secs),
            refresh_token_ttl: Duration::seconds(config.refresh_token_ttl_secs),
        })
    }

    /// Mint a fresh access/refresh pair. Persisting the refresh token is the
    /// caller's job; every pair is unique because each token carries a `jti`.
    pub fn issue_pair(&self, account_id: i32, role: Role) -> AuthResult<TokenPair> {
        let now = Utc::now();
        let access_token_expires_at = now + self.access_token_ttl;
        let refresh_token_expires_at = now + self.refresh_token_ttl;
        let header = Header::new(Algorithm::HS256);

        let access_claims = AccessTokenClaims {
            sub: account_id.to_string(),
            role: role.as_str().to_string(),
            exp: access_token_expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            typ: TokenKind::Access,
        };
        let refresh_claims = RefreshTokenClaims {
            sub: account_id.to_string(),
            exp: refresh_token_expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            typ: TokenKind::Refresh,
        };

        Ok(TokenPair {
            access_token: encode(&header, &access_claims, &self.encoding_key)?,
            access_token_expires_at,
            refresh_token: encode(&header, &refresh_claims, &self.encoding_key)?,
            refresh_token_expires_at,
        })
    }

    /// Purely cryptographic check: signature, structure, expiry and kind.
    /// Every failure is reported as [`AuthError::TokenInvalid`].
    pub fn verify_access(&self, token: &str) -> AuthResult<VerifiedAccess> {
        let claims = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(reject)?
            .claims;

        if claims.typ != TokenKind::Access {
            return Err(AuthError::TokenInvalid);
        }

        Ok(VerifiedAccess {
            account_id: parse_subject(&claims.sub)?,
            role: claims.role.parse()?,
        })
    }

    /// Verify a refresh token and return the account id it was issued to.
    pub fn verify_refresh(&self, token: &str) -> AuthResult<i32> {
        let claims = decode::<RefreshTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(reject)?
            .claims;

        if claims.typ != TokenKind::Refresh {
            return Err(AuthError::TokenInvalid);
        }

        parse_subject(&claims.sub)
    }
}

fn reject(err: jsonwebtoken::errors::Error) -> AuthError {
    log::debug!("token rejected: {}", err);
    AuthError::TokenInvalid
}

fn parse_subject(sub: &str) -> AuthResult<i32> {
    sub.parse::<i32>().map_err(|_| AuthError::TokenInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_JWT_SECRET: &str = "super-secret-test-key";

    fn service() -> JwtService {
        JwtService::from_config(&AuthConfig::with_secret(TEST_JWT_SECRET)).expect("jwt service")
    }

    #[test]
    fn issues_and_verifies_access_tokens() {
        let pair = service().issue_pair(42, Role::Moderator).expect("issue pair");

        let verified = service().verify_access(&pair.access_token).expect("verify");
        assert_eq!(verified.account_id, 42);
        assert_eq!(verified.role, Role::Moderator);
        assert!(pair.refresh_token_expires_at > pair.access_token_expires_at);
    }

    #[test]
    fn refresh_tokens_carry_only_the_subject() {
        let pair = service().issue_pair(7, Role::User).expect("issue pair");
        assert_eq!(service().verify_refresh(&pair.refresh_token).expect("verify"), 7);
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let svc = service();
        let pair = svc.issue_pair(7, Role::Admin).expect("issue pair");

        assert!(matches!(
            svc.verify_access(&pair.refresh_token),
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            svc.verify_refresh(&pair.access_token),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn rejects_foreign_signatures() {
        let other = JwtService::from_config(&AuthConfig::with_secret("another-secret"))
            .expect("jwt service");
        let pair = other.issue_pair(1, Role::Admin).expect("issue pair");

        assert!(matches!(
            service().verify_access(&pair.access_token),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn rejects_expired_tokens() {
        let mut config = AuthConfig::with_secret(TEST_JWT_SECRET);
        config.access_token_ttl_secs = -60;
        config.refresh_token_ttl_secs = -60;
        let svc = JwtService::from_config(&config).expect("jwt service");
        let pair = svc.issue_pair(1, Role::User).expect("issue pair");

        assert!(matches!(svc.verify_access(&pair.access_token), Err(AuthError::TokenInvalid)));
        assert!(matches!(svc.verify_refresh(&pair.refresh_token), Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(matches!(
            service().verify_access("not.a.jwt"),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn consecutive_pairs_differ() {
        let svc = service();
        let first = svc.issue_pair(3, Role::User).expect("first");
        let second = svc.issue_pair(3, Role::User).expect("second");
        assert_ne!(first.refresh_token, second.refresh_token);
    }
}

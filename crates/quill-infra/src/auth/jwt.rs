//! HS256 access/refresh tokens.
//!
//! Both kinds share one secret and issuer and differ in lifetime and in the
//! `token_type` claim. A refresh token is never accepted where an access
//! token is expected, and the other way round.

use chrono::{TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quill_core::ports::{AuthError, TokenClaims, TokenKind, TokenService};

const DEFAULT_SECRET: &str = "change-me-in-production";

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_hours: i64,
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_SECRET.to_string(),
            access_ttl_minutes: 30,
            refresh_ttl_hours: 24,
            issuer: "quill-api".to_string(),
        }
    }
}

fn env_number(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl JwtConfig {
    /// Read `JWT_SECRET`, `JWT_ACCESS_TTL_MINUTES`, `JWT_REFRESH_TTL_HOURS` and `JWT_ISSUER`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secret = std::env::var("JWT_SECRET").unwrap_or(defaults.secret);

        if secret == DEFAULT_SECRET {
            let production = matches!(
                std::env::var("RUST_ENV").as_deref(),
                Ok("production" | "prod")
            );
            if production {
                tracing::error!("JWT_SECRET is not set; tokens are signed with the built-in secret");
            } else {
                tracing::warn!("JWT_SECRET is not set, using the development secret");
            }
        }

        Self {
            secret,
            access_ttl_minutes: env_number("JWT_ACCESS_TTL_MINUTES", defaults.access_ttl_minutes),
            refresh_ttl_hours: env_number("JWT_REFRESH_TTL_HOURS", defaults.refresh_ttl_hours),
            issuer: std::env::var("JWT_ISSUER").unwrap_or(defaults.issuer),
        }
    }
}

/// Wire form of the token payload.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    username: String,
    roles: Vec<String>,
    token_type: String,
    iat: i64,
    exp: i64,
    iss: String,
}

pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtTokenService {
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::default();
        validation.set_issuer(&[&config.issuer]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
        }
    }

    fn lifetime(&self, kind: TokenKind) -> TimeDelta {
        match kind {
            TokenKind::Access => TimeDelta::minutes(self.config.access_ttl_minutes),
            TokenKind::Refresh => TimeDelta::hours(self.config.refresh_ttl_hours),
        }
    }
}

impl TokenService for JwtTokenService {
    fn generate_token(
        &self,
        user_id: Uuid,
        username: &str,
        roles: Vec<String>,
        kind: TokenKind,
    ) -> Result<String, AuthError> {
        let issued_at = Utc::now();
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            roles,
            token_type: kind.as_str().to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.lifetime(kind)).timestamp(),
            iss: self.config.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    fn validate_token(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })?
            .claims;

        if claims.token_type != kind.as_str() {
            return Err(AuthError::InvalidToken(format!(
                "{} token used where a {} token is required",
                claims.token_type,
                kind.as_str()
            )));
        }

        Ok(TokenClaims {
            user_id: claims.sub,
            username: claims.username,
            roles: claims.roles,
            kind,
            exp: claims.exp,
        })
    }

    fn expiration_seconds(&self, kind: TokenKind) -> i64 {
        self.lifetime(kind).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::domain::STAFF_ROLE;

    fn service(issuer: &str) -> JwtTokenService {
        JwtTokenService::new(JwtConfig {
            secret: "test-secret-key".to_string(),
            access_ttl_minutes: 5,
            refresh_ttl_hours: 1,
            issuer: issuer.to_string(),
        })
    }

    #[test]
    fn access_token_carries_staff_privilege() {
        let tokens = service("quill-test");
        let user_id = Uuid::new_v4();

        let token = tokens
            .generate_token(
                user_id,
                "editor",
                vec!["user".to_string(), STAFF_ROLE.to_string()],
                TokenKind::Access,
            )
            .unwrap();
        let claims = tokens.validate_token(&token, TokenKind::Access).unwrap();

        assert_eq!(claims.kind, TokenKind::Access);
        let principal = claims.principal();
        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.username, "editor");
        assert!(principal.is_privileged);
    }

    #[test]
    fn plain_user_is_not_privileged() {
        let tokens = service("quill-test");
        let token = tokens
            .generate_token(Uuid::new_v4(), "reader", vec!["user".to_string()], TokenKind::Access)
            .unwrap();

        let claims = tokens.validate_token(&token, TokenKind::Access).unwrap();
        assert!(!claims.principal().is_privileged);
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let tokens = service("quill-test");
        let user_id = Uuid::new_v4();

        let refresh = tokens
            .generate_token(user_id, "reader", vec![], TokenKind::Refresh)
            .unwrap();
        let access = tokens
            .generate_token(user_id, "reader", vec![], TokenKind::Access)
            .unwrap();

        assert!(tokens.validate_token(&refresh, TokenKind::Refresh).is_ok());
        assert!(matches!(
            tokens.validate_token(&refresh, TokenKind::Access),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(
            tokens.validate_token(&access, TokenKind::Refresh),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn garbage_and_foreign_tokens_are_rejected() {
        let ours = service("quill-test");
        let theirs = service("someone-else");

        assert!(matches!(
            ours.validate_token("not.a.jwt", TokenKind::Access),
            Err(AuthError::InvalidToken(_))
        ));

        let foreign = theirs
            .generate_token(Uuid::new_v4(), "reader", vec![], TokenKind::Access)
            .unwrap();
        assert!(ours.validate_token(&foreign, TokenKind::Access).is_err());
    }

    #[test]
    fn lifetimes_follow_config() {
        let tokens = service("quill-test");

        assert_eq!(tokens.expiration_seconds(TokenKind::Access), 300);
        assert_eq!(tokens.expiration_seconds(TokenKind::Refresh), 3600);
    }
}

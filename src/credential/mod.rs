//! Access and refresh credentials
//!
//! Access tokens are short-lived HS256 JWTs. Refresh tokens are JWTs signed
//! with a separate secret and carrying a random `jti`; only their HMAC
//! digest is persisted, so a leaked table cannot be replayed. Every
//! rejection surfaces as the same `Unauthorized` error and the reason is
//! only logged.

pub mod password;

pub use password::{Argon2Hasher, PasswordHasher};

use crate::config::JwtConfig;
use crate::context::Context;
use crate::domain::{RefreshToken, Role, StringUuid, UserInfo};
use crate::error::{AppError, Result};
use crate::repository::RefreshTokenRepository;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// `access` or `refresh`; a token is only accepted for its own purpose
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<StringUuid> {
        StringUuid::parse_str(&self.sub).map_err(|_| unauthorized("subject is not a uuid"))
    }

    pub fn user_info(&self) -> Result<UserInfo> {
        Ok(UserInfo {
            id: self.user_id()?,
            username: self.username.clone(),
            role: self.role,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

pub struct CredentialService {
    config: JwtConfig,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
}

impl CredentialService {
    pub fn new(config: JwtConfig, refresh_tokens: Arc<dyn RefreshTokenRepository>) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            config,
            refresh_tokens,
        }
    }

    /// Five seconds of leeway instead of the library's sixty.
    fn strict_validation() -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.leeway = 5;
        v
    }

    /// Sign a fresh access/refresh pair. Nothing is persisted.
    pub fn issue_pair(&self, user_id: StringUuid, username: &str, role: Role) -> Result<TokenPair> {
        let now = Utc::now();
        let access_expires_at = now + chrono_ttl(self.config.access_ttl)?;
        let refresh_expires_at = now + chrono_ttl(self.config.refresh_ttl)?;

        let access = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            token_type: TOKEN_TYPE_ACCESS.to_string(),
            jti: None,
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
        };
        let refresh = Claims {
            token_type: TOKEN_TYPE_REFRESH.to_string(),
            jti: Some(generate_jti()),
            exp: refresh_expires_at.timestamp(),
            ..access.clone()
        };

        let header = Header::new(Algorithm::HS256);
        Ok(TokenPair {
            access_token: encode(&header, &access, &self.access_encoding)
                .map_err(|e| AppError::Internal(e.into()))?,
            refresh_token: encode(&header, &refresh, &self.refresh_encoding)
                .map_err(|e| AppError::Internal(e.into()))?,
            access_expires_at,
            refresh_expires_at,
        })
    }

    pub fn parse_access(&self, token: &str) -> Result<Claims> {
        self.parse(token, &self.access_decoding, TOKEN_TYPE_ACCESS)
    }

    pub fn parse_refresh(&self, token: &str) -> Result<Claims> {
        self.parse(token, &self.refresh_decoding, TOKEN_TYPE_REFRESH)
    }

    fn parse(&self, token: &str, key: &DecodingKey, expected_type: &str) -> Result<Claims> {
        let claims = decode::<Claims>(token, key, &Self::strict_validation())
            .map_err(|e| {
                tracing::warn!(token_type = expected_type, error = %e, "Token rejected");
                unauthorized_generic()
            })?
            .claims;

        if claims.token_type != expected_type {
            tracing::warn!(
                expected = expected_type,
                actual = %claims.token_type,
                "Token used for the wrong purpose"
            );
            return Err(unauthorized_generic());
        }
        Ok(claims)
    }

    /// Storage digest of a refresh token: HMAC-SHA256 keyed by the refresh secret.
    pub fn digest(&self, token: &str) -> Result<String> {
        hash_token(token, self.config.refresh_secret.as_bytes())
    }

    pub async fn persist_refresh(
        &self,
        ctx: &Context,
        digest: &str,
        user_id: StringUuid,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.refresh_tokens
            .create(ctx, user_id, digest, expires_at)
            .await?;
        Ok(())
    }

    pub async fn lookup_refresh(&self, ctx: &Context, digest: &str) -> Result<Option<RefreshToken>> {
        self.refresh_tokens.find_by_hash(ctx, digest).await
    }

    /// Idempotent. Returns whether this call did the revoking.
    pub async fn revoke_refresh(&self, ctx: &Context, digest: &str) -> Result<bool> {
        self.refresh_tokens.revoke(ctx, digest).await
    }

    /// Issue a pair for `user` and persist the refresh digest.
    pub async fn issue_session(&self, ctx: &Context, user: &UserInfo) -> Result<TokenPair> {
        let pair = self.issue_pair(user.id, &user.username, user.role)?;
        let digest = self.digest(&pair.refresh_token)?;
        self.persist_refresh(ctx, &digest, user.id, pair.refresh_expires_at)
            .await?;
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, revoking the old one.
    ///
    /// `principal` is the current state of the token's subject, loaded by
    /// the caller. Run inside a transaction so revoke and persist land
    /// together.
    pub async fn rotate(&self, ctx: &Context, token: &str, principal: &UserInfo) -> Result<TokenPair> {
        let claims = self.parse_refresh(token)?;
        if claims.user_id()? != principal.id {
            tracing::warn!(sub = %claims.sub, principal = %principal.id, "Refresh token subject mismatch");
            return Err(unauthorized_generic());
        }

        let digest = self.digest(token)?;
        let stored = match self.lookup_refresh(ctx, &digest).await? {
            Some(stored) => stored,
            None => {
                tracing::warn!(user_id = %principal.id, "Refresh token not found");
                return Err(unauthorized_generic());
            }
        };

        if stored.revoked_at.is_some() {
            tracing::warn!(user_id = %principal.id, token_id = %stored.id, "Refresh token already revoked");
            return Err(unauthorized_generic());
        }
        if !stored.is_valid_at(Utc::now()) {
            tracing::warn!(user_id = %principal.id, token_id = %stored.id, "Refresh token expired");
            return Err(unauthorized_generic());
        }
        if stored.user_id != principal.id {
            tracing::warn!(token_id = %stored.id, "Stored refresh token belongs to another principal");
            return Err(unauthorized_generic());
        }

        if !self.revoke_refresh(ctx, &digest).await? {
            tracing::warn!(token_id = %stored.id, "Refresh token revoked concurrently");
            return Err(unauthorized_generic());
        }

        self.issue_session(ctx, principal).await
    }

    pub fn access_ttl(&self) -> std::time::Duration {
        self.config.access_ttl
    }

    pub fn refresh_ttl(&self) -> std::time::Duration {
        self.config.refresh_ttl
    }
}

fn unauthorized(reason: &str) -> AppError {
    tracing::warn!(reason, "Credential rejected");
    unauthorized_generic()
}

fn unauthorized_generic() -> AppError {
    AppError::Unauthorized("invalid or expired token".to_string())
}

fn chrono_ttl(ttl: std::time::Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(ttl)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("token ttl out of range: {}", e)))
}

fn generate_jti() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

/// Deterministic HMAC-SHA256 so a token can be looked up by its digest.
fn hash_token(token: &str, key: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init error: {}", e)))?;
    mac.update(token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

//! Access and refresh token minting.
//!
//! Tokens are HMAC-signed JWTs over the shared secret. Verification proves
//! authenticity and freshness only; whether the token is still bound to a
//! user (not revoked) is decided by the token store.

use crate::errors::AuthError;
use crate::models::{Role, User, UserStatus};
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Which half of the pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
    pub token_use: TokenUse,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid_signing_method")]
    InvalidSigningMethod,

    #[error("invalid_signature")]
    InvalidSignature,

    #[error("expired")]
    Expired,

    #[error("malformed_claims: {0}")]
    MalformedClaims(String),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        AuthError::InvalidToken(err.to_string())
    }
}

/// A freshly minted token and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies signed tokens.
#[derive(Clone)]
pub struct TokenMinter {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenMinter {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access(&self, user: &User) -> Result<IssuedToken, AuthError> {
        self.issue_at(user, TokenUse::Access, Utc::now())
    }

    pub fn issue_refresh(&self, user: &User) -> Result<IssuedToken, AuthError> {
        self.issue_at(user, TokenUse::Refresh, Utc::now())
    }

    /// Mint a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        user: &User,
        token_use: TokenUse,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let ttl = match token_use {
            TokenUse::Access => self.access_ttl,
            TokenUse::Refresh => self.refresh_ttl,
        };
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AuthError::Crypto(format!("Token lifetime out of range: {}", e)))?;
        let expires_at = now + ttl;

        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            status: user.status,
            sub: user.id.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_use,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Crypto(format!("Token signing failed: {}", e)))?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify signature and expiry against the clock value `now`.
    ///
    /// A token is expired from the second `now == exp` onwards.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let header =
            decode_header(token).map_err(|e| TokenError::MalformedClaims(e.to_string()))?;
        if !matches!(
            header.alg,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(TokenError::InvalidSigningMethod);
        }

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => TokenError::InvalidSigningMethod,
                _ => TokenError::MalformedClaims(e.to_string()),
            })?
            .claims;

        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.sub != claims.user_id.to_string() {
            return Err(TokenError::MalformedClaims(
                "subject does not match user_id".to_string(),
            ));
        }

        Ok(claims)
    }

    /// Verify and require a particular token use.
    pub fn verify_use(&self, token: &str, expected: TokenUse) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.token_use != expected {
            return Err(TokenError::MalformedClaims(format!(
                "expected {:?} token",
                expected
            )));
        }
        Ok(claims)
    }
}

//! Password hashing and random secret generation.

pub mod jwt;

use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::errors::AuthError;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::instrument;

/// Bytes of entropy in reset, verify-email, and session tokens.
pub const TOKEN_BYTES: usize = 16;

/// Digits in a forgot-password OTP.
pub const OTP_DIGITS: usize = 6;

/// Hash verified against when the user does not exist, so the response time
/// of a failed login does not reveal whether the email is registered.
const DUMMY_PASSWORD_HASH: &str = "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

/// Hash a password with bcrypt.
#[instrument(skip_all)]
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(AuthError::Crypto(format!(
            "Invalid bcrypt cost: {} (must be {}-{})",
            cost, MIN_BCRYPT_COST, MAX_BCRYPT_COST
        )));
    }

    bcrypt::hash(password, cost)
        .map_err(|e| AuthError::Crypto(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a bcrypt hash in constant time.
#[instrument(skip_all)]
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash)
        .map_err(|e| AuthError::Crypto(format!("Password verification failed: {}", e)))
}

/// Burn one bcrypt verification for a login against an unknown email.
#[instrument(skip_all)]
pub fn verify_against_dummy(password: &str) {
    let _ = bcrypt::verify(password, DUMMY_PASSWORD_HASH);
}

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>, AuthError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|e| AuthError::Crypto(format!("Random bytes generation failed: {}", e)))?;
    Ok(bytes)
}

/// 128-bit random token, hex-encoded.
pub fn generate_token() -> Result<String, AuthError> {
    Ok(hex::encode(generate_random_bytes(TOKEN_BYTES)?))
}

/// Six-digit numeric OTP. Leading zeros are kept (`"034251"`).
///
/// Drawn by rejection sampling over `u32` so every code is equally likely.
pub fn generate_otp() -> Result<String, AuthError> {
    const SPACE: u32 = 1_000_000;
    // Largest multiple of SPACE that fits in u32.
    const LIMIT: u32 = u32::MAX - (u32::MAX % SPACE);

    let rng = SystemRandom::new();
    loop {
        let mut buf = [0u8; 4];
        rng.fill(&mut buf)
            .map_err(|e| AuthError::Crypto(format!("Random OTP generation failed: {}", e)))?;
        let value = u32::from_be_bytes(buf);
        if value < LIMIT {
            return Ok(format!("{:0width$}", value % SPACE, width = OTP_DIGITS));
        }
    }
}

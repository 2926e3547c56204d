//! Fixed values shared by auth tests.

use auth_service::config::{AuthSettings, MIN_BCRYPT_COST};
use common::identity::{USER_EMAIL_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use common::secret::SecretString;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

/// 32-byte HMAC key used by every test server.
pub const TEST_JWT_SECRET: &str = "test-signing-key-0123456789abcdef";

/// Gateway base URL embedded in verification links.
pub const TEST_GATEWAY_URL: &str = "http://gateway.test";

/// A password that satisfies every complexity rule.
pub const TEST_PASSWORD: &str = "Abcdef1!";

/// A second valid password, for reset flows.
pub const TEST_NEW_PASSWORD: &str = "NewPass1!";

pub const TEST_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
pub const TEST_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Auth settings with the cheapest accepted bcrypt cost.
pub fn test_settings() -> AuthSettings {
    AuthSettings {
        jwt_secret: SecretString::from(TEST_JWT_SECRET),
        access_token_ttl: TEST_ACCESS_TTL,
        refresh_token_ttl: TEST_REFRESH_TTL,
        bcrypt_cost: MIN_BCRYPT_COST,
        api_gateway_url: TEST_GATEWAY_URL.to_string(),
    }
}

pub fn register_body(email: &str, username: &str, password: &str) -> Value {
    json!({ "email": email, "username": username, "password": password })
}

pub fn login_body(email: &str, password: &str) -> Value {
    json!({ "email": email, "password": password })
}

/// Identity headers as the gateway would stamp them for an admin caller.
pub fn admin_identity() -> Vec<(&'static str, String)> {
    identity_headers(Uuid::new_v4(), "root@lms.test", "admin")
}

/// Identity headers for an arbitrary caller.
pub fn identity_headers(user_id: Uuid, email: &str, role: &str) -> Vec<(&'static str, String)> {
    vec![
        (USER_ID_HEADER, user_id.to_string()),
        (USER_EMAIL_HEADER, email.to_string()),
        (USER_ROLE_HEADER, role.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_key_is_long_enough() {
        assert!(TEST_JWT_SECRET.len() >= 32);
        assert!(test_settings().refresh_token_ttl > test_settings().access_token_ttl);
    }
}

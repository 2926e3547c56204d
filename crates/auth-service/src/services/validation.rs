//! Input validation for credentials and identity fields.

use crate::errors::AuthError;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 32;
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 255;
const MAX_EMAIL_LENGTH: usize = 254;

/// Trim and lowercase an email, then check its shape.
pub fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_ascii_lowercase();
    if !is_valid_email(&email) {
        return Err(AuthError::Validation("Invalid email format".to_string()));
    }
    Ok(email)
}

fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LENGTH {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty()
        || !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-'))
    {
        return false;
    }

    // Domain must have at least one dot and no empty labels
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

pub fn validate_username(username: &str) -> Result<String, AuthError> {
    let username = username.trim();
    let len = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&len) {
        return Err(AuthError::Validation(format!(
            "Username must be between {} and {} characters",
            MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
        )));
    }
    Ok(username.to_string())
}

/// Password policy: 8-32 printable ASCII characters with at least one
/// uppercase letter, lowercase letter, digit, and special character.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
        return Err(AuthError::Validation(format!(
            "Password must be between {} and {} characters",
            MIN_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH
        )));
    }

    if !password.chars().all(|c| c.is_ascii_graphic()) {
        return Err(AuthError::Validation(
            "Password contains unsupported characters".to_string(),
        ));
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| c.is_ascii_punctuation());

    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(AuthError::Validation(
            "Password must contain an uppercase letter, a lowercase letter, a digit, and a special character"
                .to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_normalized() {
        assert_eq!(
            normalize_email("  Alice@Example.COM ").ok().as_deref(),
            Some("alice@example.com")
        );
        assert_eq!(normalize_email("a@b.c").ok().as_deref(), Some("a@b.c"));
    }

    #[test]
    fn test_invalid_emails_rejected() {
        for email in [
            "",
            "plainaddress",
            "@example.com",
            "user@",
            "user@localhost",
            "user@@example.com",
            "user@example..com",
            "user name@example.com",
            "user@-example.com",
        ] {
            assert!(normalize_email(email).is_err(), "accepted {email:?}");
        }
    }

    #[test]
    fn test_username_length_bounds() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username(&"x".repeat(255)).is_ok());
        assert!(validate_username(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_password_length_boundaries() {
        // Exactly 8 and exactly 32 are accepted.
        assert!(validate_password("Abcdef1!").is_ok());
        assert!(validate_password(&format!("Ab1!{}", "x".repeat(28))).is_ok());

        assert!(validate_password("Abcde1!").is_err());
        assert!(validate_password(&format!("Ab1!{}", "x".repeat(29))).is_err());
    }

    #[test]
    fn test_password_requires_each_class() {
        assert!(validate_password("abcdef1!").is_err(), "missing upper");
        assert!(validate_password("ABCDEF1!").is_err(), "missing lower");
        assert!(validate_password("Abcdefg!").is_err(), "missing digit");
        assert!(validate_password("Abcdefg1").is_err(), "missing special");
    }

    #[test]
    fn test_password_rejects_characters_outside_charset() {
        assert!(validate_password("Abcd ef1!").is_err());
        assert!(validate_password("Abcdéf1!").is_err());
        assert!(validate_password("NewPass1!").is_ok());
    }
}

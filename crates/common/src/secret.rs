//! Secret wrappers for credentials that must never reach a log line.
//!
//! Passwords, signing keys, provider client secrets, and object-store keys
//! are held as [`SecretString`]. Its `Debug` output is redacted, so structs
//! carrying secrets can derive `Debug` and still be passed to `tracing`.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginForm {
//!     email: String,
//!     password: SecretString,
//! }
//!
//! let form = LoginForm {
//!     email: "a@b.c".to_string(),
//!     password: SecretString::from("Abcdef1!"),
//! };
//!
//! assert!(!format!("{form:?}").contains("Abcdef1!"));
//! assert_eq!(form.password.expose_secret(), "Abcdef1!");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct ProviderCredentials {
        client_id: String,
        client_secret: SecretString,
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let secret = SecretString::from("jwt-signing-key");
        let debug = format!("{secret:?}");
        assert!(!debug.contains("jwt-signing-key"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_deserialized_secret_is_redacted_in_parent_debug() {
        let creds: ProviderCredentials =
            serde_json::from_str(r#"{"client_id":"zoom-app","client_secret":"s3cr3t"}"#).unwrap();

        let debug = format!("{creds:?}");
        assert!(debug.contains("zoom-app"));
        assert!(!debug.contains("s3cr3t"));
        assert_eq!(creds.client_secret.expose_secret(), "s3cr3t");
    }
}

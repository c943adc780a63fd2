//! # wr-auth-simple
//!
//! Argon2-based implementation of `AdminAuth`. The admin token is checked
//! against a PHC-format hash supplied through configuration, so the secret
//! itself never lives in the process environment.

use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use async_trait::async_trait;
use wr_core::traits::AdminAuth;

pub struct SimpleAdminAuth {
    /// PHC string, e.g. `$argon2id$v=19$...`
    token_hash: String,
}

impl SimpleAdminAuth {
    pub fn new(token_hash: &str) -> Self {
        Self {
            token_hash: token_hash.to_string(),
        }
    }
}

#[async_trait]
impl AdminAuth for SimpleAdminAuth {
    /// Verifies a presented token against the stored Argon2 hash.
    /// An unparsable hash simply denies everything.
    async fn verify_token(&self, token: &str) -> bool {
        let parsed_hash = match PasswordHash::new(&self.token_hash) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::error!("admin token hash is not a valid PHC string: {err}");
                return false;
            }
        };
        Argon2::default()
            .verify_password(token.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{PasswordHasher, SaltString};

    fn hash(token: &str) -> String {
        let salt = SaltString::encode_b64(b"wordregistrysalt").unwrap();
        Argon2::default()
            .hash_password(token.as_bytes(), &salt)
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn accepts_the_right_token_and_nothing_else() {
        let auth = SimpleAdminAuth::new(&hash("correct horse"));
        assert!(auth.verify_token("correct horse").await);
        assert!(!auth.verify_token("battery staple").await);
    }

    #[tokio::test]
    async fn malformed_hash_denies_everything() {
        let auth = SimpleAdminAuth::new("not-a-phc-string");
        assert!(!auth.verify_token("anything").await);
    }
}

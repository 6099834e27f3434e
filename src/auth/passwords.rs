use argon2::{
    Algorithm, Argon2, ParamsBuilder, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::RngCore;

use crate::auth::{AuthError, AuthResult};

const SALT_LEN: usize = 16;

/// Argon2id hasher for local account passwords.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new() -> AuthResult<Self> {
        let mut builder = ParamsBuilder::new();
        builder.m_cost(19 * 1024); // 19 MiB
        builder.t_cost(2);
        builder.p_cost(1);
        let params = builder.build().map_err(AuthError::from)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2 })
    }

    pub fn hash_password(&self, password: &str) -> AuthResult<String> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(AuthError::from)?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(AuthError::from)?
            .to_string();
        Ok(hash)
    }

    /// Returns `Ok(false)` on mismatch and on a stored value that is not a
    /// parseable PHC string, so a corrupt row reads as bad credentials.
    pub fn verify_password(&self, password: &str, encoded: &str) -> AuthResult<bool> {
        let parsed = match PasswordHash::new(encoded) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("stored password hash is unreadable: {}", err);
                return Ok(false);
            }
        };
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AuthError::from(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_and_verifies_passwords() {
        let service = PasswordService::new().expect("password service");
        let hash = service.hash_password("secret").expect("hash generation");
        assert!(hash.starts_with("$argon2id$"));
        assert!(service.verify_password("secret", &hash).expect("verify succeeds"));
        assert!(!service.verify_password("wrong", &hash).expect("verify runs"));
    }

    #[test]
    fn garbage_hash_is_a_mismatch() {
        let service = PasswordService::new().expect("password service");
        assert!(!service.verify_password("secret", "not-a-hash").expect("verify runs"));
    }
}

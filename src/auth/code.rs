//! Unlock code hashing and verification using Argon2
//!
//! Uses argon2id variant with recommended parameters. Unlock codes are the
//! knowledge factor an owner hands to their executor out of band; only the
//! PHC hash is ever persisted.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;

use crate::types::PassageError;

/// Generate a numeric unlock code of the given length.
///
/// Codes are short enough to read over the phone, so the hash (not the
/// code) is what the release record stores.
pub fn generate_unlock_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect()
}

/// Hash an unlock code using Argon2id
///
/// Returns the PHC-formatted hash string that includes the salt and parameters.
pub fn hash_unlock_code(code: &str) -> Result<String, PassageError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(code.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PassageError::Auth(format!("Failed to hash unlock code: {e}")))
}

/// Verify an unlock code against a stored hash
///
/// Returns true if the code matches the hash.
pub fn verify_unlock_code(code: &str, hash: &str) -> Result<bool, PassageError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PassageError::Auth(format!("Invalid unlock code hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(code.as_bytes(), &parsed_hash)
        .is_ok())
}

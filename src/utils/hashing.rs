use argon2::Argon2;
use argon2::password_hash::{
    Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use rand_core::OsRng;

/// Generates a fresh salt, encoded as the B64 string stored next to the hash.
pub fn generate_salt() -> String {
    SaltString::generate(&mut OsRng).as_str().to_string()
}

/// Hashes `password` with the stored `salt` into a PHC string.
pub fn hash_password(password: &str, salt: &str) -> Result<String, HashError> {
    hash_with_salt(password, salt)
}

/// Checks `password` against a PHC string, using the salt embedded in it.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn hash_email(email: &str, salt: &str) -> Result<String, HashError> {
    hash_with_salt(email, salt)
}

/// Re-hashes `email` with `salt` and compares it to `email_hash`.
///
/// Digest outputs are compared in constant time.
pub fn verify_email(email: &str, email_hash: &str, salt: &str) -> bool {
    let Ok(rehashed) = hash_with_salt(email, salt) else {
        return false;
    };
    let (Ok(fresh), Ok(stored)) = (PasswordHash::new(&rehashed), PasswordHash::new(email_hash))
    else {
        return false;
    };
    match (fresh.hash, stored.hash) {
        (Some(fresh_output), Some(stored_output)) => {
            fresh.salt == stored.salt && fresh_output == stored_output
        }
        _ => false,
    }
}

fn hash_with_salt(secret: &str, salt: &str) -> Result<String, HashError> {
    let salt = SaltString::from_b64(salt)?;
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

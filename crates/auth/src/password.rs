//! Password hashing (bcrypt).

use thiserror::Error;

/// Minimum accepted password length, enforced before hashing.
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,

    #[error("hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Hash a plaintext password with bcrypt at the default cost.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    if plain.len() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    Ok(bcrypt::hash(plain, bcrypt::DEFAULT_COST)?)
}

/// Constant-time comparison of a plaintext candidate against a stored hash.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    Ok(bcrypt::verify(plain, hash)?)
}

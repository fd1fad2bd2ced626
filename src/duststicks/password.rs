//! Argon2id password digests.
//!
//! Hashing is CPU and memory heavy; async callers go through
//! [`hash_blocking`] / [`verify_blocking`] so the work lands on the blocking pool.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed")]
    HashingFailed,

    #[error("invalid password digest")]
    InvalidHash,

    #[error("password task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Hash a password into a PHC string with a fresh salt.
///
/// # Errors
/// Returns `HashingFailed` if argon2 rejects the input.
pub fn hash(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| PasswordError::HashingFailed)?;

    Ok(digest.to_string())
}

/// Check a password against a stored PHC string.
///
/// # Errors
/// Returns `InvalidHash` if the stored digest cannot be parsed.
pub fn verify(password: &str, digest: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(digest).map_err(|_| PasswordError::InvalidHash)?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// [`hash`] on the blocking thread pool.
///
/// # Errors
/// Returns the hashing error, or `Join` if the task panicked.
pub async fn hash_blocking(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash(&password)).await?
}

/// [`verify`] on the blocking thread pool.
///
/// # Errors
/// Returns the verify error, or `Join` if the task panicked.
pub async fn verify_blocking(password: String, digest: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify(&password, &digest)).await?
}

// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use crate::error::AppError;
use scrypt::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};
use zeroize::Zeroize;

/// Hash a password using scrypt with the configured work factor (log2 N).
pub fn hash_password(plain: &str, log_n: u8) -> Result<String, AppError> {
    let params = Params::new(log_n, 8, 1, Params::RECOMMENDED_LEN)
        .map_err(|e| AppError::Internal(format!("scrypt params: {e}")))?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, params, &salt)
        .map_err(|e| AppError::Internal(format!("hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Hash a password and zeroize the plaintext.
pub fn hash_password_secure(plain: &mut String, log_n: u8) -> Result<String, AppError> {
    let hash = hash_password(plain, log_n)?;
    plain.zeroize();
    Ok(hash)
}

/// Verify a password against a stored PHC hash. The work factor is read
/// back from the hash itself, so older hashes keep verifying after a cost
/// change.
pub fn verify_password(hash: &str, password: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Scrypt
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

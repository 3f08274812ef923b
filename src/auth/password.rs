//! Password hashing with bcrypt. The salt lives inside the produced hash,
//! so the same password hashes differently every time.

use bcrypt::{hash, verify, BcryptError, DEFAULT_COST};

/// Hash a plaintext password for storage.
pub fn hash_password(plain: &str) -> Result<String, BcryptError> {
    hash(plain, DEFAULT_COST)
}

/// Check a plaintext password against a stored hash.
/// Returns false on mismatch or on an undecodable hash.
pub fn verify_password(plain: &str, hashed: &str) -> bool {
    verify(plain, hashed).unwrap_or(false)
}

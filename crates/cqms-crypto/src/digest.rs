use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the UTF-8 password bytes.
pub fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Compare a plaintext password against a stored lowercase hex digest.
pub fn verify_password(password: &str, stored_digest: &str) -> bool {
    password_digest(password) == stored_digest
}

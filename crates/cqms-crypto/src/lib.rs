/// CQMS Crypto Library
///
/// Passwords are stored as an unsalted SHA-256 digest so that existing
/// `users.hashed_password` rows keep verifying.

pub mod digest;

pub use digest::{password_digest, verify_password};

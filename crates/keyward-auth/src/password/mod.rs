//! Password digests and the policy for new passwords.
//!
//! Hashing is Argon2id with the cost from `[auth.argon2]`.

pub mod hasher;
pub mod validator;

pub use hasher::PasswordHasher;
pub use validator::PasswordValidator;

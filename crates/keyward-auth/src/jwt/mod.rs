//! Access and refresh token signing, verification, and hashing.

pub mod claims;
pub mod codec;
pub mod decoder;
pub mod encoder;

pub use claims::{Claims, TokenSubject, TokenType};
pub use codec::{TokenCodec, generate_opaque_token, hash_token};
pub use decoder::JwtDecoder;
pub use encoder::{IssuedToken, JwtEncoder};

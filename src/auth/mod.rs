//! Token issuing and password hashing for the bundled identity provider

pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtService, TokenPair};
pub use password::PasswordHasher;

pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtService, TokenPair, TokenType};
pub use password::PasswordHasher;

pub mod ports;
pub mod user;

pub use ports::*;
pub use user::*;

// Utility functions
pub mod error;
pub mod logging;
pub mod pagination;
pub mod trace;

pub use error::*;
pub use pagination::*;

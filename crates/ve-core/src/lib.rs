pub mod error;
pub mod types;

pub use error::VeError;
pub use types::*;

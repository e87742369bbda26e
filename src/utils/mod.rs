// Utility modules
pub mod error;
pub mod config;
pub mod logging;

pub use error::*;
pub use config::*;
pub use logging::*;

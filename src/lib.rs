pub mod utils;
pub mod models;
pub mod gateway;
pub mod engine;
pub mod cli;

pub use utils::*;
pub use models::*;
pub use gateway::*;
pub use engine::*;
pub use cli::*;

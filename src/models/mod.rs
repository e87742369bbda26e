// Record and session models
pub mod records;
pub mod requests;
pub mod app_state;

pub use records::*;
pub use requests::*;
pub use app_state::*;

// Command engine components
pub mod command;
pub mod terminal;
pub mod dispatcher;

pub use command::*;
pub use terminal::*;
pub use dispatcher::*;

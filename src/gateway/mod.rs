// API gateway implementations
pub mod event_stream;
pub mod gateway_trait;
pub mod http_gateway;
pub mod mock_gateway;

pub use event_stream::*;
pub use gateway_trait::*;
pub use http_gateway::*;
pub use mock_gateway::*;

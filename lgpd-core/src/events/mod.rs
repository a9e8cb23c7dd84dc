//! Job lifecycle events: optional push notification alongside snapshot reads.

pub mod dispatcher;
pub mod handler;
pub mod types;

pub use dispatcher::EventDispatcher;
pub use handler::JobEventHandler;
pub use types::*;

pub mod broker;
pub mod handler;

pub use broker::*;
pub use handler::*;

pub mod app_config;
pub mod broker;
pub mod consumer;
pub mod logging;

pub use app_config::*;
pub use broker::*;
pub use consumer::*;
pub use logging::*;

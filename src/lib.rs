pub mod config;
pub mod constants;
pub mod error;
pub mod inference;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod types;

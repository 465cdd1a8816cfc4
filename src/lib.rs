pub mod config;
pub mod error;
pub mod files;
pub mod gateway;
pub mod server;
pub mod store;
pub mod telemetry;

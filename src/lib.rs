pub mod api;
pub mod config;
pub mod core;
pub mod generation;
pub mod persistence;
pub mod session;
pub mod telemetry;

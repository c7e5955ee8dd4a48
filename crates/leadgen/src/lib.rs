//! Lead intake and geographic routing for a network of affiliated property agents.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;

pub use error::AppError;

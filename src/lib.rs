//! ScreenPilot library
//!
//! Configuration and agent wiring shared by the CLI and integration tests.

pub mod agent;
pub mod config;
pub mod errors;

pub use agent::{model_provider, Agent};
pub use config::{load_config, AgentConfig, ConfigError};
pub use errors::AgentError;

//! Process-level plumbing shared by gateway binaries: layered configuration and logging.

pub mod config;
pub mod logging;

pub use config::{AppConfig, CliArgs, FileLogConfig, LoggingConfig, ServerConfig};
pub use logging::init_logging_from_config;

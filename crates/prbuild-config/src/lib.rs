//! Configuration for the prbuild daemon.
//!
//! This crate handles:
//! - Daemon settings (prbuild.kdl)
//! - Hosting-service credentials from the environment

pub mod credentials;
pub mod daemon;
pub mod error;

pub use credentials::Credentials;
pub use daemon::{DaemonConfig, ExecutorConfig, OverlapPolicy, load_daemon_config, parse_daemon_config};
pub use error::{ConfigError, ConfigResult};

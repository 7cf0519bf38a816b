//! Beacon CLI library
//!
//! Configuration loading, the bot application and command dispatch for the
//! `beacon` binary.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use app::BeaconApp;
pub use cli::{Cli, Commands};
pub use config::{AppConfig, BotConfig, ConfigError};
pub use error::{CliError, Result};

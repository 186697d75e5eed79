//! BLE chat CLI library
//!
//! Configuration, file-backed history, transport selection and the
//! line-mode front-end for the `blechat` binary.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod history;
pub mod terminal;

pub use app::BlechatApp;
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
pub use history::FileHistoryStore;

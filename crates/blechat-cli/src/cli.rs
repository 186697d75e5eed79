//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use the simulated transport instead of the BLE radio
    #[arg(long)]
    pub simulate: bool,

    /// Directory for conversation history
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Scan once and list discovered devices
    Scan,
    /// Connect to a device and chat over stdin
    Chat {
        /// Device id as printed by `scan`
        device_id: String,
    },
    /// Start interactive command-line mode
    Interactive,
    /// Print the stored conversation with a device
    History {
        /// Device id as printed by `scan`
        device_id: String,
    },
    /// Print the effective configuration
    Config,
}

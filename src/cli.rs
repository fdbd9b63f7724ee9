use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// rockpi-sata: fan, button and display daemon for the ROCK Pi SATA HAT
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// `on` starts the daemon, `off` powers the board down
    #[arg(value_enum, default_value_t = Command::On)]
    pub command: Command,

    /// YAML config file path (default: $ROCKPI_SATA_CONFIG or /etc/rockpi-sata/config.yml)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    On,
    Off,
}

use anyhow::{Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info};
use syslog::{BasicLogger, Facility, Formatter3164};

use rockpi_sata::{application::Application, cli::Cli, config::ConfigManager};

fn init_log(level: LevelFilter) -> Result<()> {
    let logger = syslog::unix(Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: "rockpi-sata".into(),
        pid: std::process::id(),
    })
    .map_err(|e| anyhow!("{e}"))?;

    log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
        .map(|()| log::set_max_level(level))
        .map_err(|e| anyhow!("{e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = init_log(level) {
        eprintln!("rockpi-sata: syslog unavailable, logging disabled: {e}");
    }

    let config_manager = ConfigManager::load(cli.config).await?;
    info!("rockpi-sata {} {:?}", env!("CARGO_PKG_VERSION"), cli.command);

    Application::builder()
        .with_config_manager(config_manager)
        .build()?
        .run(cli.command)
        .await
}

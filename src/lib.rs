//! # rockpi-sata
//!
//! A Linux daemon for the ROCK Pi / Raspberry Pi SATA HAT top board.
//!
//! ## Features
//!
//! - **Fan control**: cpu and top-board fans follow a four-level curve,
//!   quantized or linear, driven by the board, processor or disk temperatures
//! - **Button**: click, double click and long press decoded from one pin and
//!   bound to configurable actions
//! - **OLED display**: rotating status pages with on-demand refresh
//! - **Disk power**: staged power-up of the SATA lines, optional power-down
//!
//! ## Architecture
//!
//! [`SystemCoordinator`](coordinator::SystemCoordinator) brings the board up
//! and starts one worker per
//! [`ServiceProvider`](providers::ServiceProvider). Workers share only the
//! atomic cells of [`SharedState`](app_context::SharedState), two FIFO
//! queues (gestures and display tokens) and the display lock.
//!
//! ## Example
//!
//! ```no_run
//! use rockpi_sata::{application::Application, cli::Command, config::ConfigManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config_manager = ConfigManager::load(None).await?;
//!     Application::builder()
//!         .with_config_manager(config_manager)
//!         .build()?
//!         .run(Command::On)
//!         .await
//! }
//! ```

pub mod actions;
pub mod app_context;
pub mod application;
pub mod button;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod display;
pub mod drivers;
pub mod event;
pub mod fan_controller;
pub mod fan_curve;
pub mod providers;
pub mod sensors;
pub mod system_info;
pub mod task_manager;
pub mod temperature_sensors;

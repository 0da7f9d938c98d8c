//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Used when `--config` is not given; a missing file there means defaults.
pub const DEFAULT_CONFIG: &str = "etc/cane_config.toml";

#[inline]
pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "cane", version, about = "Cane feedback link CLI")]
pub struct Cli {
    /// Path to config TOML [default: etc/cane_config.toml, optional]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins when set
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Talk to the built-in simulated device instead of a serial port
    #[arg(long, action = ArgAction::SetTrue)]
    pub sim: bool,

    /// Override the serial port from the config
    #[arg(long, value_name = "PORT")]
    pub port: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List serial ports the connector can open
    Ports,
    /// Send one command byte (L, R, F, C, D or left/right/stop/calibrate/down)
    Send {
        /// Command to send
        cmd: cane_core::Command,
        /// Bypass the repeat throttle
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Print bytes received from the device
    Monitor {
        /// How long to listen, in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 5_000)]
        ms: u64,
    },
    /// Run the calibration handshake and wait for the result
    Calibrate {
        /// Tick period while waiting, in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 10)]
        tick_ms: u64,
    },
    /// Scripted session: calibrate, start, and replay a few collisions
    Demo,
    /// Quick health check (port opens, config valid)
    SelfCheck,
}

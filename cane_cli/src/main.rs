mod cli;
mod commands;
mod device;
mod error_fmt;
mod logging;

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, DEFAULT_CONFIG, JSON_MODE, json_mode};
use crate::commands::App;
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    // Only fails if a handler is already installed.
    let _ = color_eyre::install();

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "command failed");
        if json_mode() {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

/// Read and validate the config. An explicit `--config` must exist; the
/// default path may be absent, in which case defaults apply.
fn load_config(path: Option<PathBuf>) -> eyre::Result<cane_config::Config> {
    let (path, explicit) = match path {
        Some(p) => (p, true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let cfg = match fs::read_to_string(&path) {
        Ok(text) => cane_config::load_toml(&text)
            .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?,
        Err(e) if !explicit && e.kind() == ErrorKind::NotFound => cane_config::Config::default(),
        Err(e) => {
            return Err(e).wrap_err_with(|| format!("failed to read config {}", path.display()));
        }
    };
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn run(cli: Cli) -> eyre::Result<()> {
    let mut cfg = load_config(cli.config)?;
    if let Some(port) = cli.port {
        cfg.serial.port = port;
    }
    logging::init(cli.json, cli.log_level.as_deref(), &cfg.logging)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let app = App {
        session_cfg: (&cfg).into(),
        cfg,
        sim: cli.sim,
        json: cli.json,
        shutdown,
    };

    match cli.cmd {
        Commands::Ports => commands::ports(&app),
        Commands::Send { cmd, force } => commands::send(&app, cmd, force),
        Commands::Monitor { ms } => commands::monitor(&app, ms),
        Commands::Calibrate { tick_ms } => commands::calibrate(&app, tick_ms),
        Commands::Demo => commands::demo(&app),
        Commands::SelfCheck => commands::self_check(&app),
    }
}

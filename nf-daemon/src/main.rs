//! notefand
//!
//! Privileged daemon driving notebook fans through the embedded controller.
//! Loads a per-model configuration, runs the temperature control loop, and
//! serves a Unix-socket control protocol for status queries and manual fan
//! speed overrides.
//!
//! Logging goes to stdout/stderr via `tracing`; the level is taken from
//! `NOTEFAN_LOG` (default `info`, or `debug` with `--debug`).

mod server;
mod service;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use nf_core::constants::paths;
use nf_core::EcKind;
use tokio::sync::{Mutex, Notify};
use tracing::{error, info};

use crate::service::{Service, ServiceOptions, SharedService};

#[derive(Parser, Debug)]
#[command(name = "notefand", about = "Notebook fan control daemon", version)]
struct Cli {
    /// Path to the service configuration file.
    #[arg(short, long, default_value = paths::SERVICE_CONFIG)]
    config: PathBuf,

    /// Override the control socket path.
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Force an embedded controller backend (ec_sys, acpi_ec, dev_port, dummy).
    #[arg(short, long, value_name = "TYPE")]
    embedded_controller: Option<EcKind>,

    /// Never write to the embedded controller.
    #[arg(short, long)]
    read_only: bool,

    /// Log every embedded controller operation.
    #[arg(long)]
    debug: bool,
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.debug { "debug" } else { "info" };
    let filter = std::env::var("NOTEFAN_LOG").unwrap_or_else(|_| default_level.to_string());
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .init();
}

/// EC access needs root; a read-only run may go ahead without it and fail
/// later if the backend is not accessible.
fn verify_privileges(cli: &Cli) -> Result<(), String> {
    // SAFETY: geteuid only returns the process's effective user id.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 && !cli.read_only {
        return Err(
            "notefand must run as root for embedded controller access (or use --read-only)"
                .to_string(),
        );
    }
    Ok(())
}

// ============================================================================
// PID file
// ============================================================================

fn write_pid_file() -> io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let path = paths::PID_FILE;

    if Path::new(path).exists() {
        if let Ok(contents) = fs::read_to_string(path) {
            if let Ok(old_pid) = contents.trim().parse::<i32>() {
                // SAFETY: signal 0 only checks whether the process exists.
                if unsafe { libc::kill(old_pid, 0) } == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::AddrInUse,
                        format!("another instance is running (PID {old_pid})"),
                    ));
                }
            }
        }
        // Stale PID file from a previous run
        let _ = fs::remove_file(path);
    }

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o644)
        .open(path)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(())
}

fn remove_pid_file() {
    let _ = fs::remove_file(paths::PID_FILE);
}

// ============================================================================
// Signals
// ============================================================================

async fn wait_for_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = terminate.recv() => {}
        _ = interrupt.recv() => {}
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    info!("notefand {} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = verify_privileges(&cli) {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = write_pid_file() {
        error!("could not write PID file {}: {e}", paths::PID_FILE);
        return ExitCode::FAILURE;
    }

    let options = ServiceOptions {
        service_config_path: cli.config.clone(),
        embedded_controller: cli.embedded_controller,
        read_only: cli.read_only,
        trace_ec: cli.debug,
    };

    let service = match Service::init(options) {
        Ok(service) => service,
        Err(e) => {
            error!("initialization failed: {e}");
            remove_pid_file();
            return ExitCode::FAILURE;
        }
    };

    let service: SharedService = Arc::new(Mutex::new(service));
    let quit = Arc::new(AtomicBool::new(false));
    let shutdown = Arc::new(Notify::new());

    {
        let quit = quit.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = wait_for_signal().await {
                error!("failed to install signal handlers: {e}");
                std::future::pending::<()>().await;
            }
            info!("received shutdown signal");
            quit.store(true, Ordering::SeqCst);
            shutdown.notify_waiters();
        });
    }

    let loop_handle = tokio::spawn(service::run_loop(
        service.clone(),
        quit.clone(),
        shutdown.clone(),
    ));

    let socket_path = cli
        .socket
        .clone()
        .unwrap_or_else(|| PathBuf::from(paths::SOCKET));
    let server_result = server::run(
        &socket_path,
        service.clone(),
        quit.clone(),
        shutdown.clone(),
    )
    .await;

    // The server only returns on shutdown or on a fatal bind error; either
    // way the control loop has to stop before the EC is restored.
    quit.store(true, Ordering::SeqCst);
    shutdown.notify_waiters();
    let _ = loop_handle.await;

    service.lock().await.shutdown();
    remove_pid_file();

    match server_result {
        Ok(()) => {
            info!("notefand stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("server error: {e}");
            ExitCode::FAILURE
        }
    }
}

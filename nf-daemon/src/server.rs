//! Control socket server
//!
//! Listens on a Unix stream socket, spawns one worker per accepted
//! connection, and dispatches the two client commands under the service
//! lock. A worker handles exactly one request and closes its socket.
//! Handler errors travel back to the client as `{"Error":"..."}`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nf_core::constants::limits;
use nf_error::{Error, Result};
use nf_protocol::{ErrorReply, OkReply};
use serde_json::{Map, Value};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::service::{Service, SharedService};

/// Accept connections until shutdown.
///
/// Repeated accept failures eventually request a global shutdown instead
/// of spinning forever.
pub async fn run(
    socket_path: &Path,
    service: SharedService,
    quit: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) -> Result<()> {
    if socket_path.exists() {
        let metadata = fs::symlink_metadata(socket_path)?;
        if metadata.file_type().is_symlink() {
            return Err(Error::generic(format!(
                "{}: refusing to replace a symlink",
                socket_path.display()
            )));
        }
        fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)
        .map_err(|e| Error::generic(format!("bind {}: {e}", socket_path.display())))?;
    fs::set_permissions(socket_path, fs::Permissions::from_mode(0o666))?;
    info!("listening on {} (mode 0666)", socket_path.display());

    let mut failures: u32 = 0;
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, _addr)) => {
                    failures = 0;
                    let service = service.clone();
                    tokio::spawn(handle_client(stream, service));
                }
                Err(e) => {
                    // accept() returns a benign error when the listener is
                    // torn down during shutdown
                    if quit.load(Ordering::SeqCst) {
                        break;
                    }
                    warn!("accept failed: {e}");
                    failures += 1;
                    if failures >= limits::MAX_SERVER_FAILURES {
                        error!("server giving up after {failures} consecutive failures");
                        quit.store(true, Ordering::SeqCst);
                        shutdown.notify_waiters();
                        break;
                    }
                }
            },
            _ = shutdown.notified() => break,
        }
    }

    let _ = fs::remove_file(socket_path);
    Ok(())
}

async fn handle_client(mut stream: UnixStream, service: SharedService) {
    if let Err(e) = serve_connection(&mut stream, &service).await {
        debug!("request failed: {e}");
        let _ = nf_protocol::send_json(&mut stream, &ErrorReply::new(e.to_string())).await;
    }
}

/// Read one framed request, dispatch it, send the reply.
async fn serve_connection(stream: &mut UnixStream, service: &SharedService) -> Result<()> {
    let payload = nf_protocol::read_message(stream).await?;

    let request: Value = serde_json::from_slice(&payload)
        .map_err(|e| Error::protocol(format!("invalid JSON: {e}")))?;
    let object = request
        .as_object()
        .ok_or_else(|| Error::protocol("Not a JSON object"))?;
    let command = object
        .get("Command")
        .ok_or_else(|| Error::protocol("Missing 'Command' field"))?
        .as_str()
        .ok_or_else(|| Error::protocol("Command: not a string"))?;

    let mut service = service.lock().await;
    match command {
        nf_protocol::CMD_SET_FAN_SPEED => {
            let args = parse_set_fan_speed(object, service.fan_count())?;
            apply_set_fan_speed(&mut service, &args)?;
            service.write_target_speeds_to_config()?;
            nf_protocol::send_json(stream, &OkReply::ok()).await
        }
        nf_protocol::CMD_STATUS => {
            if object.len() > 1 {
                return Err(Error::protocol("Unknown arguments"));
            }
            let reply = service.status_reply();
            nf_protocol::send_json(stream, &reply).await
        }
        _ => Err(Error::protocol("Invalid command")),
    }
}

// ============================================================================
// set-fan-speed
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SpeedArg {
    Auto,
    Fixed(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SetFanSpeedArgs {
    /// Fan index; all fans when absent
    pub fan: Option<usize>,
    pub speed: SpeedArg,
}

/// Validate the `set-fan-speed` arguments.
///
/// The accepted keys and the error strings are part of the wire contract.
pub(crate) fn parse_set_fan_speed(
    object: &Map<String, Value>,
    fan_count: usize,
) -> Result<SetFanSpeedArgs> {
    let mut fan = None;
    let mut speed = None;

    for (key, value) in object {
        match key.as_str() {
            "Command" => {}
            "Fan" => {
                let index = value
                    .as_i64()
                    .ok_or_else(|| Error::protocol("Fan: Not an integer"))?;
                if index < 0 {
                    return Err(Error::protocol("Fan: Cannot be negative"));
                }
                if index as usize >= fan_count {
                    return Err(Error::protocol("Fan: No such fan available"));
                }
                fan = Some(index as usize);
            }
            "Speed" => {
                speed = Some(if value.as_str() == Some("auto") {
                    SpeedArg::Auto
                } else if let Some(percent) = value.as_f64() {
                    if !(0.0..=100.0).contains(&percent) {
                        return Err(Error::protocol("Speed: Invalid value"));
                    }
                    SpeedArg::Fixed(percent as f32)
                } else {
                    return Err(Error::protocol("Speed: Invalid type. Either float or 'auto'"));
                });
            }
            _ => return Err(Error::protocol("Unknown arguments")),
        }
    }

    let speed = speed.ok_or_else(|| Error::protocol("Missing argument: Speed"))?;
    Ok(SetFanSpeedArgs { fan, speed })
}

/// Apply the parsed command to the selected fan(s) and flush.
fn apply_set_fan_speed(service: &mut Service, args: &SetFanSpeedArgs) -> Result<()> {
    let Service {
        fans, ec, options, ..
    } = service;

    for (index, control) in fans.iter_mut().enumerate() {
        if args.fan.map_or(true, |selected| selected == index) {
            match args.speed {
                SpeedArg::Auto => control.fan.set_auto_speed(),
                SpeedArg::Fixed(percent) => control.fan.set_fixed_speed(percent),
            }
            if !options.read_only {
                control.fan.ec_flush(ec.as_mut())?;
            }
        }
    }

    Ok(())
}

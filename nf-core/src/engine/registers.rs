//! Register write configurations
//!
//! Model configs can list extra EC register pokes: some machines need a
//! "manual fan control" bit set before speed writes stick, and some need
//! registers restored on exit. `And`/`Or` writes fold the register's
//! current value into the new one.

use nf_error::{Result, ResultExt};
use tracing::warn;

use crate::data::{RegisterWriteConfiguration, RegisterWriteMode, RegisterWriteOccasion};
use crate::hw::EmbeddedController;

/// Apply a single masked register write.
pub fn apply_one(
    ec: &mut dyn EmbeddedController,
    register: u8,
    value: u8,
    mode: RegisterWriteMode,
) -> Result<()> {
    let value = match mode {
        RegisterWriteMode::Set => value,
        RegisterWriteMode::And => ec.read_byte(register)? & value,
        RegisterWriteMode::Or => ec.read_byte(register)? | value,
    };
    ec.write_byte(register, value)
}

/// Apply every configuration that is due.
///
/// Initialization applies all of them; afterwards only those with
/// `WriteOccasion == OnWriteFanSpeed` are repeated.
pub fn apply_all(
    ec: &mut dyn EmbeddedController,
    configs: &[RegisterWriteConfiguration],
    initializing: bool,
) -> Result<()> {
    for cfg in configs {
        if initializing || cfg.write_occasion == RegisterWriteOccasion::OnWriteFanSpeed {
            apply_one(ec, cfg.register, cfg.value, cfg.write_mode)
                .with_context(|| format!("register write '{}'", cfg.description))?;
        }
    }
    Ok(())
}

/// Restore every configuration that requires a reset.
///
/// All entries are attempted; the last error is returned.
pub fn reset_all(
    ec: &mut dyn EmbeddedController,
    configs: &[RegisterWriteConfiguration],
) -> Result<()> {
    let mut last_error = None;

    for cfg in configs.iter().filter(|c| c.reset_required) {
        if let Err(e) = apply_one(ec, cfg.register, cfg.reset_value, cfg.reset_write_mode) {
            warn!("register reset '{}' failed: {e}", cfg.description);
            last_error = Some(e);
        }
    }

    match last_error {
        None => Ok(()),
        Some(e) => Err(e),
    }
}

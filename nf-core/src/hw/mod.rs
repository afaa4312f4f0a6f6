//! Hardware interaction
//!
//! - EC register backends behind the [`EmbeddedController`] trait
//! - hwmon temperature sensor enumeration

mod dev_port;
mod dummy;
mod ec_sysfs;
pub mod sensors;
mod trace;

pub use dev_port::EcDevPort;
pub use dummy::EcDummy;
pub use ec_sysfs::EcSysfs;
pub use sensors::{Sensor, SensorHub};
pub use trace::EcTrace;

use nf_error::{Error, Result};
use tracing::{debug, info};

use crate::data::EcKind;

/// Register probed during backend auto-detection
const PROBE_REGISTER: u8 = 0x00;

/// Byte/word access to the embedded controller's register space.
///
/// Word access defaults to two byte operations in little-endian order;
/// backends with native 16-bit access override the word methods.
pub trait EmbeddedController: Send {
    fn open(&mut self) -> Result<()>;

    fn close(&mut self);

    fn read_byte(&mut self, register: u8) -> Result<u8>;

    fn write_byte(&mut self, register: u8, value: u8) -> Result<()>;

    fn read_word(&mut self, register: u8) -> Result<u16> {
        let lo = self.read_byte(register)?;
        let hi = self.read_byte(register.wrapping_add(1))?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn write_word(&mut self, register: u8, value: u16) -> Result<()> {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(register, lo)?;
        self.write_byte(register.wrapping_add(1), hi)
    }
}

/// Construct the backend for a configured [`EcKind`]
pub fn ec_by_kind(kind: EcKind) -> Box<dyn EmbeddedController + Send> {
    match kind {
        EcKind::EcSysfs => Box::new(EcSysfs::debugfs()),
        EcKind::EcAcpi => Box::new(EcSysfs::acpi()),
        EcKind::EcDevPort => Box::new(EcDevPort::new()),
        EcKind::EcDummy => Box::new(EcDummy::new()),
    }
}

/// Try the real backends in order and return the first one that opens and
/// answers a probe read.
///
/// The dummy backend is never auto-selected.
pub fn find_working() -> Result<(EcKind, Box<dyn EmbeddedController + Send>)> {
    const CANDIDATES: &[EcKind] = &[EcKind::EcSysfs, EcKind::EcAcpi, EcKind::EcDevPort];

    let mut attempts = Vec::with_capacity(CANDIDATES.len());

    for &kind in CANDIDATES {
        let mut ec = ec_by_kind(kind);
        match ec.open().and_then(|()| ec.read_byte(PROBE_REGISTER)) {
            Ok(_) => {
                info!("auto-detected embedded controller '{kind}'");
                return Ok((kind, ec));
            }
            Err(e) => {
                debug!("embedded controller '{kind}' not usable: {e}");
                attempts.push(format!("{kind}: {e}"));
                ec.close();
            }
        }
    }

    Err(Error::EcAutodetect(attempts.join("; ")))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// In-memory register map used by tests across the crate
    pub struct MockEc {
        pub registers: [u8; 256],
        pub writes: Vec<(u8, u8)>,
        pub fail_reads: bool,
        pub fail_writes: bool,
    }

    impl MockEc {
        pub fn new() -> Self {
            Self {
                registers: [0; 256],
                writes: Vec::new(),
                fail_reads: false,
                fail_writes: false,
            }
        }
    }

    impl EmbeddedController for MockEc {
        fn open(&mut self) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) {}

        fn read_byte(&mut self, register: u8) -> Result<u8> {
            if self.fail_reads {
                return Err(Error::ec("mock read failure"));
            }
            Ok(self.registers[register as usize])
        }

        fn write_byte(&mut self, register: u8, value: u8) -> Result<()> {
            if self.fail_writes {
                return Err(Error::ec("mock write failure"));
            }
            self.registers[register as usize] = value;
            self.writes.push((register, value));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockEc;
    use super::*;

    #[test]
    fn test_default_word_access_is_little_endian() {
        let mut ec = MockEc::new();
        ec.registers[0x2e] = 0x34;
        ec.registers[0x2f] = 0x12;
        assert_eq!(ec.read_word(0x2e).unwrap(), 0x1234);

        ec.write_word(0x40, 0xbeef).unwrap();
        assert_eq!(ec.registers[0x40], 0xef);
        assert_eq!(ec.registers[0x41], 0xbe);
    }

    #[test]
    fn test_ec_by_kind_covers_all_variants() {
        for kind in [
            EcKind::EcSysfs,
            EcKind::EcAcpi,
            EcKind::EcDevPort,
            EcKind::EcDummy,
        ] {
            let _ = ec_by_kind(kind);
        }
    }
}

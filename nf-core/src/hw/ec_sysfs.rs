//! File-backed EC register backends
//!
//! Two kernel interfaces expose the EC register space as a seekable file:
//! the `ec_sys` debugfs window (`/sys/kernel/debug/ec/ec0/io`, needs
//! `write_support=1`) and the `acpi_ec` character device (`/dev/ec`).
//! Both support positioned reads and writes at the register offset, so one
//! implementation covers both; only the path and the kernel module differ.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::process::Command;

use nf_error::{Error, Result};
use tracing::debug;

use super::EmbeddedController;
use crate::constants::ec;

pub struct EcSysfs {
    path: PathBuf,
    modprobe_args: &'static [&'static str],
    file: Option<File>,
}

impl EcSysfs {
    /// Backend using the `ec_sys` debugfs register window
    pub fn debugfs() -> Self {
        Self {
            path: PathBuf::from(ec::SYSFS_IO),
            modprobe_args: &["ec_sys", "write_support=1"],
            file: None,
        }
    }

    /// Backend using the `acpi_ec` character device
    pub fn acpi() -> Self {
        Self {
            path: PathBuf::from(ec::ACPI_DEV),
            modprobe_args: &["acpi_ec"],
            file: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            modprobe_args: &[],
            file: None,
        }
    }

    fn try_open(&self) -> io::Result<File> {
        OpenOptions::new().read(true).write(true).open(&self.path)
    }

    fn device(&self) -> Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| Error::ec("embedded controller not open"))
    }
}

impl EmbeddedController for EcSysfs {
    fn open(&mut self) -> Result<()> {
        let file = match self.try_open() {
            Ok(file) => file,
            Err(first_err) if !self.modprobe_args.is_empty() => {
                // The register window only exists once the module is loaded.
                debug!(
                    "open {} failed ({first_err}), loading module {}",
                    self.path.display(),
                    self.modprobe_args[0]
                );
                let _ = Command::new("modprobe").args(self.modprobe_args).output();
                self.try_open()
                    .map_err(|e| Error::ec(format!("{}: {e}", self.path.display())))?
            }
            Err(e) => return Err(Error::ec(format!("{}: {e}", self.path.display()))),
        };
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn read_byte(&mut self, register: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.device()?
            .read_exact_at(&mut buf, register as u64)
            .map_err(|e| {
                Error::ec(format!(
                    "{}: read register 0x{register:02x}: {e}",
                    self.path.display()
                ))
            })?;
        Ok(buf[0])
    }

    fn write_byte(&mut self, register: u8, value: u8) -> Result<()> {
        self.device()?
            .write_all_at(&[value], register as u64)
            .map_err(|e| {
                Error::ec(format!(
                    "{}: write register 0x{register:02x}: {e}",
                    self.path.display()
                ))
            })
    }

    // The register window is a flat byte array, so a word is one positioned
    // two-byte access.
    fn read_word(&mut self, register: u8) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.device()?
            .read_exact_at(&mut buf, register as u64)
            .map_err(|e| {
                Error::ec(format!(
                    "{}: read register 0x{register:02x}: {e}",
                    self.path.display()
                ))
            })?;
        Ok(u16::from_le_bytes(buf))
    }

    fn write_word(&mut self, register: u8, value: u16) -> Result<()> {
        self.device()?
            .write_all_at(&value.to_le_bytes(), register as u64)
            .map_err(|e| {
                Error::ec(format!(
                    "{}: write register 0x{register:02x}: {e}",
                    self.path.display()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn register_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_write_bytes() {
        let file = register_file(&[0u8; 256]);
        let mut ec = EcSysfs::at_path(file.path());
        ec.open().unwrap();

        ec.write_byte(0x10, 0xaa).unwrap();
        assert_eq!(ec.read_byte(0x10).unwrap(), 0xaa);
        assert_eq!(ec.read_byte(0x11).unwrap(), 0x00);
    }

    #[test]
    fn test_word_access_little_endian() {
        let file = register_file(&[0u8; 256]);
        let mut ec = EcSysfs::at_path(file.path());
        ec.open().unwrap();

        ec.write_word(0x20, 0x1234).unwrap();
        assert_eq!(ec.read_byte(0x20).unwrap(), 0x34);
        assert_eq!(ec.read_byte(0x21).unwrap(), 0x12);
        assert_eq!(ec.read_word(0x20).unwrap(), 0x1234);
    }

    #[test]
    fn test_not_open_is_an_error() {
        let file = register_file(&[0u8; 4]);
        let mut ec = EcSysfs::at_path(file.path());
        assert!(ec.read_byte(0).is_err());

        ec.open().unwrap();
        assert!(ec.read_byte(0).is_ok());

        ec.close();
        assert!(ec.read_byte(0).is_err());
    }

    #[test]
    fn test_open_missing_path_fails() {
        let mut ec = EcSysfs::at_path("/nonexistent/register/window");
        assert!(ec.open().is_err());
    }
}

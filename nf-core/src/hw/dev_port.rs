//! Port-I/O EC backend
//!
//! Talks to the EC through the classic keyboard-controller style interface
//! on ports 0x62 (data) and 0x66 (command/status), accessed as offsets into
//! `/dev/port`. Every transfer waits for the input buffer to drain (IBF
//! clear) before sending and for the output buffer to fill (OBF set) before
//! receiving, with a bounded deadline so a wedged EC cannot hang the loop.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::thread;
use std::time::{Duration, Instant};

use nf_error::{Error, Result};

use super::EmbeddedController;
use crate::constants::ec;

const DATA_PORT: u64 = 0x62;
const COMMAND_PORT: u64 = 0x66;

const CMD_READ: u8 = 0x80;
const CMD_WRITE: u8 = 0x81;

/// Output buffer full: a data byte is ready on the data port
const STATUS_OBF: u8 = 0x01;
/// Input buffer full: the EC has not consumed the last byte yet
const STATUS_IBF: u8 = 0x02;

const STATUS_TIMEOUT: Duration = Duration::from_millis(100);
const STATUS_POLL_PAUSE: Duration = Duration::from_micros(100);

pub struct EcDevPort {
    file: Option<File>,
}

impl EcDevPort {
    pub fn new() -> Self {
        Self { file: None }
    }

    fn device(&self) -> Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| Error::ec("embedded controller not open"))
    }

    fn inb(file: &File, port: u64) -> Result<u8> {
        let mut buf = [0u8; 1];
        file.read_exact_at(&mut buf, port)
            .map_err(|e| Error::ec(format!("{}: read port 0x{port:02x}: {e}", ec::DEV_PORT)))?;
        Ok(buf[0])
    }

    fn outb(file: &File, port: u64, value: u8) -> Result<()> {
        file.write_all_at(&[value], port)
            .map_err(|e| Error::ec(format!("{}: write port 0x{port:02x}: {e}", ec::DEV_PORT)))
    }

    /// Poll the status port until `mask` reads as `set`, or time out.
    fn wait_status(file: &File, mask: u8, set: bool) -> Result<()> {
        let deadline = Instant::now() + STATUS_TIMEOUT;
        loop {
            let status = Self::inb(file, COMMAND_PORT)?;
            if ((status & mask) != 0) == set {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::EcTimeout(format!(
                    "status bit 0x{mask:02x} did not become {}",
                    if set { "set" } else { "clear" }
                )));
            }
            thread::sleep(STATUS_POLL_PAUSE);
        }
    }
}

impl Default for EcDevPort {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddedController for EcDevPort {
    fn open(&mut self) -> Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(ec::DEV_PORT)
            .map_err(|e| Error::ec(format!("{}: {e}", ec::DEV_PORT)))?;
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn read_byte(&mut self, register: u8) -> Result<u8> {
        let file = self.device()?;
        Self::wait_status(file, STATUS_IBF, false)?;
        Self::outb(file, COMMAND_PORT, CMD_READ)?;
        Self::wait_status(file, STATUS_IBF, false)?;
        Self::outb(file, DATA_PORT, register)?;
        Self::wait_status(file, STATUS_OBF, true)?;
        Self::inb(file, DATA_PORT)
    }

    fn write_byte(&mut self, register: u8, value: u8) -> Result<()> {
        let file = self.device()?;
        Self::wait_status(file, STATUS_IBF, false)?;
        Self::outb(file, COMMAND_PORT, CMD_WRITE)?;
        Self::wait_status(file, STATUS_IBF, false)?;
        Self::outb(file, DATA_PORT, register)?;
        Self::wait_status(file, STATUS_IBF, false)?;
        Self::outb(file, DATA_PORT, value)
    }
}

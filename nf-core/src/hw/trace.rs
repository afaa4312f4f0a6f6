//! Tracing wrapper around an EC backend
//!
//! Logs every register operation and its result, then forwards to the
//! wrapped backend. Enabled with `--debug` to record exactly what the
//! daemon does to the hardware.

use nf_error::Result;
use tracing::debug;

use super::EmbeddedController;

pub struct EcTrace {
    inner: Box<dyn EmbeddedController + Send>,
}

impl EcTrace {
    pub fn new(inner: Box<dyn EmbeddedController + Send>) -> Self {
        Self { inner }
    }
}

impl EmbeddedController for EcTrace {
    fn open(&mut self) -> Result<()> {
        debug!("ec: open");
        self.inner.open()
    }

    fn close(&mut self) {
        debug!("ec: close");
        self.inner.close();
    }

    fn read_byte(&mut self, register: u8) -> Result<u8> {
        let result = self.inner.read_byte(register);
        match &result {
            Ok(value) => debug!("ec: read  [0x{register:02x}] -> 0x{value:02x}"),
            Err(e) => debug!("ec: read  [0x{register:02x}] failed: {e}"),
        }
        result
    }

    fn write_byte(&mut self, register: u8, value: u8) -> Result<()> {
        let result = self.inner.write_byte(register, value);
        match &result {
            Ok(()) => debug!("ec: write [0x{register:02x}] <- 0x{value:02x}"),
            Err(e) => debug!("ec: write [0x{register:02x}] <- 0x{value:02x} failed: {e}"),
        }
        result
    }

    fn read_word(&mut self, register: u8) -> Result<u16> {
        let result = self.inner.read_word(register);
        match &result {
            Ok(value) => debug!("ec: read  [0x{register:02x}] -> 0x{value:04x} (word)"),
            Err(e) => debug!("ec: read  [0x{register:02x}] (word) failed: {e}"),
        }
        result
    }

    fn write_word(&mut self, register: u8, value: u16) -> Result<()> {
        let result = self.inner.write_word(register, value);
        match &result {
            Ok(()) => debug!("ec: write [0x{register:02x}] <- 0x{value:04x} (word)"),
            Err(e) => debug!("ec: write [0x{register:02x}] <- 0x{value:04x} (word) failed: {e}"),
        }
        result
    }
}

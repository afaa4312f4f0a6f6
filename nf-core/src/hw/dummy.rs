//! No-op EC backend
//!
//! Reads zeros and discards writes. Used for read-only trials of a model
//! config on machines where poking the real EC is not wanted.

use nf_error::Result;

use super::EmbeddedController;

pub struct EcDummy;

impl EcDummy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EcDummy {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddedController for EcDummy {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) {}

    fn read_byte(&mut self, _register: u8) -> Result<u8> {
        Ok(0)
    }

    fn write_byte(&mut self, _register: u8, _value: u8) -> Result<()> {
        Ok(())
    }
}

// src/fifo.rs

use crate::commands::Command;
use crate::errors::RFIDError;
use crate::registers::*;
use crate::rfid_rc522::RfidRc522;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use heapless::Vec;
use ufmt::uWrite;

/// Capacity of the chip's FIFO buffer.
pub const FIFO_SIZE: usize = 64;

impl<SPI, CS, D, W> RfidRc522<SPI, CS, D, W>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    W: uWrite,
{
    /// Appends `bytes` to the FIFO. Fails with `NoRoom` without writing
    /// anything if they do not fit next to what is already buffered.
    pub fn load_fifo(&mut self, bytes: &[u8]) -> Result<(), RFIDError> {
        if bytes.len() > FIFO_SIZE {
            return Err(RFIDError::NoRoom);
        }
        if bytes.is_empty() {
            return Ok(());
        }
        if self.fifo_level()? + bytes.len() > FIFO_SIZE {
            return Err(RFIDError::NoRoom);
        }
        self.transport.write_register_burst(FIFO_DATA_REG, bytes)
    }

    pub fn flush_fifo(&mut self) -> Result<(), RFIDError> {
        self.transport.write_register(FIFO_LEVEL_REG, FLUSH_BUFFER)
    }

    pub fn fifo_level(&mut self) -> Result<usize, RFIDError> {
        let level = self.transport.read_register(FIFO_LEVEL_REG)? & FIFO_LEVEL_MASK;
        Ok(usize::from(level))
    }

    /// Drains at most `expected` bytes; fewer if the FIFO holds less.
    pub fn read_fifo(&mut self, expected: usize) -> Result<Vec<u8, FIFO_SIZE>, RFIDError> {
        let count = expected.min(self.fifo_level()?);
        self.transport.read_register_burst(FIFO_DATA_REG, count)
    }

    /// CRC_A of `bytes` from the chip's coprocessor. `to_le_bytes()` of the
    /// result is the order the two bytes go on air.
    pub fn compute_crc(&mut self, bytes: &[u8]) -> Result<u16, RFIDError> {
        self.idle()?;
        self.transport.write_register(DIV_IRQ_REG, CRC_IRQ)?;
        self.flush_fifo()?;
        self.load_fifo(bytes)?;
        self.transport
            .write_register(COMMAND_REG, Command::CalcCRC.code())?;

        self.wait_for_irq(DIV_IRQ_REG, CRC_IRQ)?;
        self.idle()?;

        let low = self.transport.read_register(CRC_RESULT_REG_L)?;
        let high = self.transport.read_register(CRC_RESULT_REG_H)?;
        Ok(u16::from_le_bytes([low, high]))
    }
}

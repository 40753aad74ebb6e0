// src/transport.rs

use crate::cs_pin_wrapper::CsPinWrapper;
use crate::errors::RFIDError;
use crate::fifo::FIFO_SIZE;
use crate::registers::*;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Error as _, SpiBus};
use heapless::Vec;

/// Polls of CommandReg before giving up on the chip leaving power-down.
pub const READY_POLLS: u32 = 100;
const READY_POLL_INTERVAL_US: u32 = 500;

const READ: u8 = 1 << 7;

fn read_address(address: u8) -> u8 {
    ((address & ADDRESS_MASK) << 1) | READ
}

fn write_address(address: u8) -> u8 {
    (address & ADDRESS_MASK) << 1
}

/// Register access over SPI. Every call is one complete transaction framed by
/// the chip-select pin; `&mut self` keeps transactions from interleaving.
pub struct RegisterTransport<SPI, CS> {
    spi: SPI,
    cs: CsPinWrapper<CS>,
}

impl<SPI, CS> RegisterTransport<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    pub fn new(spi: SPI, cs: CS) -> Self {
        RegisterTransport {
            spi,
            cs: CsPinWrapper::new(cs),
        }
    }

    pub fn read_register(&mut self, address: u8) -> Result<u8, RFIDError> {
        let tx = [read_address(address), 0x00];
        let mut rx = [0u8; 2];
        self.transaction(|spi| spi.transfer(&mut rx, &tx))?;
        // The value is clocked out while the terminating zero is sent.
        Ok(rx[1])
    }

    pub fn write_register(&mut self, address: u8, value: u8) -> Result<(), RFIDError> {
        let tx = [write_address(address), value];
        self.transaction(|spi| spi.write(&tx))
    }

    /// Reads `count` values from the same register in one transaction.
    pub fn read_register_burst(
        &mut self,
        address: u8,
        count: usize,
    ) -> Result<Vec<u8, FIFO_SIZE>, RFIDError> {
        if count > FIFO_SIZE {
            return Err(RFIDError::NoRoom);
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        // The address is repeated once per byte and terminated with zero.
        let mut tx = [read_address(address); FIFO_SIZE + 1];
        tx[count] = 0x00;
        let mut rx = [0u8; FIFO_SIZE + 1];
        self.transaction(|spi| spi.transfer(&mut rx[..count + 1], &tx[..count + 1]))?;

        Vec::from_slice(&rx[1..count + 1]).map_err(|_| RFIDError::NoRoom)
    }

    /// Writes all of `data` to the same register in one transaction.
    pub fn write_register_burst(&mut self, address: u8, data: &[u8]) -> Result<(), RFIDError> {
        if data.len() > FIFO_SIZE {
            return Err(RFIDError::NoRoom);
        }

        let mut tx = [0u8; FIFO_SIZE + 1];
        tx[0] = write_address(address);
        tx[1..data.len() + 1].copy_from_slice(data);
        self.transaction(|spi| spi.write(&tx[..data.len() + 1]))
    }

    pub fn modify_register(
        &mut self,
        address: u8,
        f: impl FnOnce(u8) -> u8,
    ) -> Result<(), RFIDError> {
        let value = self.read_register(address)?;
        self.write_register(address, f(value))
    }

    pub fn set_bits(&mut self, address: u8, mask: u8) -> Result<(), RFIDError> {
        self.modify_register(address, |value| value | mask)
    }

    pub fn clear_bits(&mut self, address: u8, mask: u8) -> Result<(), RFIDError> {
        self.modify_register(address, |value| value & !mask)
    }

    /// Waits for the chip to leave power-down after a reset or power-up.
    pub fn wait_ready<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), RFIDError> {
        for _ in 0..READY_POLLS {
            if self.read_register(COMMAND_REG)? & POWER_DOWN == 0 {
                return Ok(());
            }
            delay.delay_us(READY_POLL_INTERVAL_US);
        }
        Err(RFIDError::BusTimeout)
    }

    /// Drives chip select to its idle level outside of any transaction.
    pub fn release_chip_select(&mut self) -> Result<(), RFIDError> {
        self.cs.deselect()
    }

    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs.release())
    }

    fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut SPI) -> Result<T, SPI::Error>,
    ) -> Result<T, RFIDError> {
        self.cs.select()?;
        let result = f(&mut self.spi).and_then(|value| self.spi.flush().map(|_| value));
        // Chip select is released even when the transfer failed.
        let released = self.cs.deselect();

        let value = result.map_err(|err| RFIDError::BusFault(err.kind().into()))?;
        released?;
        Ok(value)
    }
}

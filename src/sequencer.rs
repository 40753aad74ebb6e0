// src/sequencer.rs

use crate::commands::Command;
use crate::config::{CHIP_CHECK_ATTEMPTS, POLL_STEP_US};
use crate::diag::Hex;
use crate::errors::RFIDError;
use crate::fifo::FIFO_SIZE;
use crate::registers::*;
use crate::rfid_rc522::RfidRc522;
use crate::select::SelectState;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use heapless::Vec;
use ufmt::uWrite;

/// Bit-oriented framing of a transceive, as written to BitFramingReg.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Framing {
    /// Bits of the last transmitted byte to send; 0 sends the whole byte.
    pub tx_last_bits: u8,
    /// Bit position the first received bit is stored at.
    pub rx_align: u8,
}

impl Framing {
    /// Whole bytes in both directions.
    pub const BYTES: Framing = Framing {
        tx_last_bits: 0,
        rx_align: 0,
    };

    /// 7-bit short frame used by REQA and WUPA.
    pub const SHORT: Framing = Framing {
        tx_last_bits: 7,
        rx_align: 0,
    };

    /// Frame cut after `known` bits, with the answer continuing at the next bit.
    pub fn split_at(known: usize) -> Framing {
        let bits = (known % 8) as u8;
        Framing {
            tx_last_bits: bits,
            rx_align: bits,
        }
    }

    fn register_value(self) -> u8 {
        ((self.rx_align & 0x07) << 4) | (self.tx_last_bits & 0x07)
    }
}

/// What the chip left in its FIFO after a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub data: Vec<u8, FIFO_SIZE>,
    /// Valid bits in the last byte of `data` (8 for a whole byte).
    pub valid_bits: u8,
    /// Position of the first colliding bit (1-based, counted from bit 0 of the
    /// first received byte) when the PICCs' answers collided.
    pub collision: Option<u8>,
}

impl Response {
    fn empty() -> Self {
        Response {
            data: Vec::new(),
            valid_bits: 0,
            collision: None,
        }
    }

    fn bytes(bytes: &[u8]) -> Result<Self, RFIDError> {
        Ok(Response {
            data: Vec::from_slice(bytes).map_err(|_| RFIDError::NoRoom)?,
            valid_bits: if bytes.is_empty() { 0 } else { 8 },
            collision: None,
        })
    }
}

impl<SPI, CS, D, W> RfidRc522<SPI, CS, D, W>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    W: uWrite,
{
    /// Runs `command` with `tx` as its FIFO input and returns what it produced.
    pub fn execute(&mut self, command: Command, tx: &[u8]) -> Result<Response, RFIDError> {
        match command {
            Command::Transceive => self.transceive(tx, Framing::BYTES),
            Command::CalcCRC => {
                let crc = self.compute_crc(tx)?;
                Response::bytes(&crc.to_le_bytes())
            }
            Command::Idle => self.idle().map(|_| Response::empty()),
            Command::SoftReset => self.soft_reset().map(|_| Response::empty()),
            Command::NoCmdChange => self
                .transport
                .write_register(COMMAND_REG, command.code())
                .map(|_| Response::empty()),
            Command::Mem | Command::GenerateRandomID | Command::MFAuthent => {
                self.run_command(command, tx, Framing::BYTES)
            }
        }
    }

    /// Sends `tx` to the PICCs in the field and collects their answer.
    pub fn transceive(&mut self, tx: &[u8], framing: Framing) -> Result<Response, RFIDError> {
        self.run_command(Command::Transceive, tx, framing)
    }

    pub fn idle(&mut self) -> Result<(), RFIDError> {
        self.transport
            .write_register(COMMAND_REG, Command::Idle.code())
    }

    /// Resets every register to its power-on value and waits for the
    /// oscillator to come back.
    pub fn soft_reset(&mut self) -> Result<(), RFIDError> {
        self.transport
            .write_register(COMMAND_REG, Command::SoftReset.code())?;
        self.select_state = SelectState::Idle;
        self.transport.wait_ready(&mut self.delay)
    }

    pub fn soft_power_down(&mut self) -> Result<(), RFIDError> {
        self.transport
            .write_register(COMMAND_REG, POWER_DOWN | Command::NoCmdChange.code())
    }

    pub fn soft_power_up(&mut self) -> Result<(), RFIDError> {
        self.transport
            .write_register(COMMAND_REG, Command::NoCmdChange.code())?;
        self.transport.wait_ready(&mut self.delay)
    }

    /// Reads VersionReg until two consecutive reads agree on a plausible
    /// value. A floating or miswired bus reads back all zeros or all ones.
    pub fn verify_chip(&mut self) -> Result<u8, RFIDError> {
        for _ in 0..CHIP_CHECK_ATTEMPTS {
            let first = self.transport.read_register(VERSION_REG)?;
            let second = self.transport.read_register(VERSION_REG)?;
            if first == second && first != 0x00 && first != 0xFF {
                return Ok(first);
            }
        }
        diag!(self, "chip is not responding");
        Err(RFIDError::ChipNotResponding)
    }

    fn run_command(
        &mut self,
        command: Command,
        tx: &[u8],
        framing: Framing,
    ) -> Result<Response, RFIDError> {
        if tx.len() > FIFO_SIZE {
            return Err(RFIDError::NoRoom);
        }
        self.verify_chip()?;

        self.idle()?;
        self.transport.write_register(COMM_IRQ_REG, ALL_COMM_IRQS)?;
        self.flush_fifo()?;
        self.load_fifo(tx)?;
        self.transport
            .write_register(BIT_FRAMING_REG, framing.register_value())?;
        self.transport.write_register(COMMAND_REG, command.code())?;

        let transceive = command == Command::Transceive;
        let done = if transceive {
            self.transport.set_bits(BIT_FRAMING_REG, START_SEND)?;
            RX_IRQ | IDLE_IRQ | ERR_IRQ
        } else {
            IDLE_IRQ
        };
        let watched = if transceive { done | TIMER_IRQ } else { done };

        let irq = self.wait_for_irq(COMM_IRQ_REG, watched);
        if transceive {
            self.transport.clear_bits(BIT_FRAMING_REG, START_SEND)?;
        }
        // The chip timer runs out when no PICC answered.
        if irq? & done == 0 {
            return Err(RFIDError::NoCardPresent);
        }

        let error = self.transport.read_register(ERROR_REG)?;
        // An overheated chip has switched its antenna off.
        if error & TEMP_ERR != 0 {
            diag!(self, "chip is overheated");
            return Err(RFIDError::ChipNotResponding);
        }
        if error & (WR_ERR | BUFFER_OVFL | PARITY_ERR | PROTOCOL_ERR | CRC_ERR) != 0 {
            diag!(self, "chip reported error 0x{}", Hex(error));
            return Err(RFIDError::ProtocolError);
        }
        let collision = if error & COLL_ERR != 0 {
            let coll = self.transport.read_register(COLL_REG)?;
            if coll & COLL_POS_NOT_VALID != 0 {
                return Err(RFIDError::ProtocolError);
            }
            match coll & COLL_POS_MASK {
                0 => Some(32),
                position => Some(position),
            }
        } else {
            None
        };

        let level = self.fifo_level()?;
        let data = self.read_fifo(level)?;
        let last_bits = self.transport.read_register(CONTROL_REG)? & RX_LAST_BITS_MASK;
        let valid_bits = match (data.is_empty(), last_bits) {
            (true, _) => 0,
            (false, 0) => 8,
            (false, bits) => bits,
        };

        Ok(Response {
            data,
            valid_bits,
            collision,
        })
    }

    /// Polls `register` every `POLL_STEP_US` until one of `bits` is set.
    /// Forces the chip to Idle once `poll_budget` polls are used up. The
    /// budget counts delay steps only, so on a host with slow bus access the
    /// wall-clock wait is longer than the command timeout.
    pub(crate) fn wait_for_irq(&mut self, register: u8, bits: u8) -> Result<u8, RFIDError> {
        for _ in 0..self.config.poll_budget() {
            let irq = self.transport.read_register(register)?;
            if irq & bits != 0 {
                return Ok(irq);
            }
            self.delay.delay_us(POLL_STEP_US);
        }
        self.idle()?;
        diag!(
            self,
            "command timed out after {} us",
            self.config.command_timeout_us
        );
        Err(RFIDError::CommandTimeout)
    }
}
